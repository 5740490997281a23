//! Provisioning requests for one batch element.

use super::EntityRef;

/// Position in a batch plus the entity the outcome belongs to.
pub trait Staggered {
    /// Ordinal position in the current batch; drives the start delay.
    fn index(&self) -> usize;

    fn entity(&self) -> &EntityRef;
}

/// One team's shared-repository request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRepoDescription {
    pub index: usize,
    /// Hosting-provider usernames.
    pub members: Vec<String>,
    pub repo_name: String,
    pub team_name: String,
    /// URL already assigned outside this subsystem, if any.
    pub assigned_repo_url: Option<String>,
    pub entity: EntityRef,
}

impl GroupRepoDescription {
    /// Existing repository URL from either the description or persisted state.
    pub fn existing_url<'a>(&'a self, persisted_url: &'a str) -> Option<&'a str> {
        if !persisted_url.is_empty() {
            return Some(persisted_url);
        }
        self.assigned_repo_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }
}

impl Staggered for GroupRepoDescription {
    fn index(&self) -> usize {
        self.index
    }

    fn entity(&self) -> &EntityRef {
        &self.entity
    }
}

/// One student's individual-repository request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRepoDescription {
    pub index: usize,
    /// Hosting-provider username.
    pub student: String,
    pub repo_name: String,
    pub entity: EntityRef,
}

impl Staggered for ProjectRepoDescription {
    fn index(&self) -> usize {
        self.index
    }

    fn entity(&self) -> &EntityRef {
        &self.entity
    }
}
