//! Batch files handed to the CLI.
//!
//! ```toml
//! content_source = "https://github.com/cs310/starter-d1"
//! staff_team = "staff"                     # optional, name or id
//! webhook_url = "https://ci.example.edu/push"  # optional
//!
//! [[groups]]
//! entity = "team9"
//! members = ["alice", "bob"]
//! repo_name = "p_team9"
//! team_name = "t_team9"
//! ```
//!
//! The ordinal index of each entry is its position in the file.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::ClassforgeConfig;
use crate::config::parser::located_error;
use crate::entity::{EntityRef, GroupRepoDescription, ProjectRepoDescription};

use super::{ProvisionTargets, StaffTeam};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Id of the persisted team entity.
    pub entity: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub repo_name: String,
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupManifest {
    pub content_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_team: Option<StaffTeam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
}

impl GroupManifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse batch file: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(content).map_err(|e| located_error(&e, content))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut entities = HashSet::new();
        let mut repos = HashSet::new();
        for group in &self.groups {
            if group.entity.trim().is_empty() {
                anyhow::bail!("Group entry with repo '{}' has an empty entity id", group.repo_name);
            }
            if group.repo_name.trim().is_empty() || group.team_name.trim().is_empty() {
                anyhow::bail!("Group '{}' needs both repo_name and team_name", group.entity);
            }
            if !entities.insert(group.entity.as_str()) {
                anyhow::bail!("Group '{}' is listed more than once", group.entity);
            }
            if !repos.insert(group.repo_name.as_str()) {
                anyhow::bail!("Repository name '{}' is used by two groups", group.repo_name);
            }
        }
        Ok(())
    }

    pub fn descriptions(&self) -> Vec<GroupRepoDescription> {
        self.groups
            .iter()
            .enumerate()
            .map(|(index, group)| GroupRepoDescription {
                index,
                members: group.members.clone(),
                repo_name: group.repo_name.clone(),
                team_name: group.team_name.clone(),
                assigned_repo_url: group.repo_url.clone(),
                entity: EntityRef::team(&group.entity),
            })
            .collect()
    }

    pub fn targets(&self, config: &ClassforgeConfig) -> anyhow::Result<ProvisionTargets> {
        config.targets(
            &self.content_source,
            self.staff_team.as_ref(),
            self.webhook_url.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    /// Id of the persisted individual-project entity.
    pub entity: String,
    pub student: String,
    pub repo_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub content_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_team: Option<StaffTeam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
}

impl ProjectManifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse batch file: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(content).map_err(|e| located_error(&e, content))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut entities = HashSet::new();
        let mut repos = HashSet::new();
        for project in &self.projects {
            if project.student.trim().is_empty() {
                anyhow::bail!("Project '{}' has no student", project.entity);
            }
            if !entities.insert(project.entity.as_str()) {
                anyhow::bail!("Project '{}' is listed more than once", project.entity);
            }
            if !repos.insert(project.repo_name.as_str()) {
                anyhow::bail!("Repository name '{}' is used by two projects", project.repo_name);
            }
        }
        Ok(())
    }

    pub fn descriptions(&self) -> Vec<ProjectRepoDescription> {
        self.projects
            .iter()
            .enumerate()
            .map(|(index, project)| ProjectRepoDescription {
                index,
                student: project.student.clone(),
                repo_name: project.repo_name.clone(),
                entity: EntityRef::project(&project.entity),
            })
            .collect()
    }

    pub fn targets(&self, config: &ClassforgeConfig) -> anyhow::Result<ProvisionTargets> {
        config.targets(
            &self.content_source,
            self.staff_team.as_ref(),
            self.webhook_url.as_deref(),
        )
    }
}
