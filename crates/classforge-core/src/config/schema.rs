//! Configuration schema for classforge.toml
//!
//! ```toml
//! [github]
//! org = "cs310-fall"
//! token = "ghp_..."          # or CLASSFORGE_GITHUB_TOKEN
//!
//! [provisioning]
//! staff_team = "staff"
//! webhook_url = "https://autograder.example.edu/hooks/push"
//!
//! [store]
//! path = "/var/lib/classforge/state.toml"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::github::{DEFAULT_API_URL, DEFAULT_WEB_URL, GitHubSettings, HookSpec};
use crate::provision::{ProvisionTargets, StaffTeam};
use crate::schedule::{CREATE_DELAY_UNIT, REPAIR_DELAY_UNIT, StaggerSchedule};
use crate::transplant::{GitTransplanter, ScratchSpace};

/// Root configuration structure for classforge.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassforgeConfig {
    #[serde(default)]
    pub github: GitHubSection,

    #[serde(default)]
    pub provisioning: ProvisioningSection,

    #[serde(default)]
    pub store: StoreSection,
}

/// Hosting-provider connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_web_url")]
    pub web_url: String,

    /// Organization that owns every provisioned repository.
    #[serde(default)]
    pub org: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            web_url: default_web_url(),
            org: String::new(),
            token: None,
            user_agent: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_web_url() -> String {
    DEFAULT_WEB_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Workflow tuning and batch defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningSection {
    /// Stagger unit for clean-creation batches.
    #[serde(default = "default_create_delay_ms")]
    pub create_delay_ms: u64,

    /// Stagger unit for repair batches.
    #[serde(default = "default_repair_delay_ms")]
    pub repair_delay_ms: u64,

    #[serde(default = "default_branch")]
    pub default_branch: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,

    #[serde(default)]
    pub staff_team: StaffTeam,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,

    #[serde(default = "default_author_name")]
    pub commit_author_name: String,

    #[serde(default = "default_author_email")]
    pub commit_author_email: String,
}

impl Default for ProvisioningSection {
    fn default() -> Self {
        Self {
            create_delay_ms: default_create_delay_ms(),
            repair_delay_ms: default_repair_delay_ms(),
            default_branch: default_branch(),
            scratch_dir: None,
            staff_team: StaffTeam::default(),
            webhook_url: None,
            webhook_secret: None,
            commit_author_name: default_author_name(),
            commit_author_email: default_author_email(),
        }
    }
}

fn default_create_delay_ms() -> u64 {
    CREATE_DELAY_UNIT.as_millis() as u64
}

fn default_repair_delay_ms() -> u64 {
    REPAIR_DELAY_UNIT.as_millis() as u64
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_author_name() -> String {
    "classforge".to_string()
}

fn default_author_email() -> String {
    "classforge@users.noreply.github.com".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSection {
    /// Entity state file; defaults to `state.toml` next to the config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ClassforgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check values that would otherwise fail deep inside a workflow.
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.github.api_url)
            .with_context(|| format!("Invalid github.api_url: {}", self.github.api_url))?;
        url::Url::parse(&self.github.web_url)
            .with_context(|| format!("Invalid github.web_url: {}", self.github.web_url))?;
        if self.github.timeout_secs == 0 {
            anyhow::bail!("github.timeout_secs must be greater than zero");
        }
        if self.provisioning.default_branch.trim().is_empty() {
            anyhow::bail!("provisioning.default_branch must not be empty");
        }
        if let Some(webhook) = &self.provisioning.webhook_url {
            url::Url::parse(webhook)
                .with_context(|| format!("Invalid provisioning.webhook_url: {}", webhook))?;
        }
        Ok(())
    }

    /// Token from the override (environment) or the file.
    pub fn resolve_token(&self, token_override: Option<String>) -> Option<String> {
        token_override
            .filter(|token| !token.is_empty())
            .or_else(|| self.github.token.clone().filter(|token| !token.is_empty()))
    }

    pub fn github_settings(
        &self,
        token_override: Option<String>,
    ) -> anyhow::Result<GitHubSettings> {
        if self.github.org.trim().is_empty() {
            anyhow::bail!("github.org is not set in classforge.toml");
        }
        let token = self.resolve_token(token_override).ok_or_else(|| {
            anyhow::anyhow!("No GitHub token: set github.token or CLASSFORGE_GITHUB_TOKEN")
        })?;
        let mut settings = GitHubSettings::new(&self.github.org, token)
            .with_api_url(&self.github.api_url)
            .with_web_url(&self.github.web_url);
        if let Some(agent) = &self.github.user_agent {
            settings.user_agent = agent.clone();
        }
        settings.timeout = Duration::from_secs(self.github.timeout_secs);
        Ok(settings)
    }

    pub fn create_schedule(&self) -> StaggerSchedule {
        StaggerSchedule::new(Duration::from_millis(self.provisioning.create_delay_ms))
    }

    pub fn repair_schedule(&self) -> StaggerSchedule {
        StaggerSchedule::new(Duration::from_millis(self.provisioning.repair_delay_ms))
    }

    pub fn transplanter(&self, token: Option<String>) -> GitTransplanter {
        let scratch = match &self.provisioning.scratch_dir {
            Some(dir) => ScratchSpace::new(dir),
            None => ScratchSpace::system(),
        };
        GitTransplanter::new(scratch)
            .with_token(token.unwrap_or_default())
            .with_branch(&self.provisioning.default_branch)
            .with_author(
                &self.provisioning.commit_author_name,
                &self.provisioning.commit_author_email,
            )
    }

    /// Entity state file, falling back to `default_path`.
    pub fn store_path(&self, default_path: &Path) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| default_path.to_path_buf())
    }

    /// Batch targets: per-batch values win over configured defaults.
    pub fn targets(
        &self,
        content_source: &str,
        staff_team: Option<&StaffTeam>,
        webhook_url: Option<&str>,
    ) -> anyhow::Result<ProvisionTargets> {
        if content_source.trim().is_empty() {
            anyhow::bail!("content_source must not be empty");
        }
        let webhook_url = webhook_url
            .or(self.provisioning.webhook_url.as_deref())
            .ok_or_else(|| {
                anyhow::anyhow!("No webhook URL: set webhook_url in the batch or classforge.toml")
            })?;
        let hook =
            HookSpec::push(webhook_url).with_secret(self.provisioning.webhook_secret.clone());
        Ok(ProvisionTargets::new(
            content_source,
            staff_team
                .cloned()
                .unwrap_or_else(|| self.provisioning.staff_team.clone()),
            hook,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ClassforgeConfig::new().validate().unwrap();
    }

    #[test]
    fn settings_require_org_and_token() {
        let mut config = ClassforgeConfig::new();
        assert!(config.github_settings(Some("t".into())).is_err());

        config.github.org = "acme".to_string();
        assert!(config.github_settings(None).is_err());

        let settings = config.github_settings(Some("t".into())).unwrap();
        assert_eq!(settings.org, "acme");
        assert_eq!(settings.token, "t");
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn token_override_beats_file_token() {
        let mut config = ClassforgeConfig::new();
        config.github.token = Some("from-file".to_string());
        assert_eq!(config.resolve_token(Some("from-env".into())).as_deref(), Some("from-env"));
        assert_eq!(config.resolve_token(Some(String::new())).as_deref(), Some("from-file"));
        assert_eq!(config.resolve_token(None).as_deref(), Some("from-file"));
    }

    #[test]
    fn batch_values_override_configured_targets() {
        let mut config = ClassforgeConfig::new();
        config.provisioning.webhook_url = Some("https://hooks.example.com/default".into());
        config.provisioning.webhook_secret = Some("s".into());

        let defaults = config.targets("https://github.com/acme/starter", None, None).unwrap();
        assert_eq!(defaults.webhook.url, "https://hooks.example.com/default");
        assert_eq!(defaults.webhook.secret.as_deref(), Some("s"));
        assert_eq!(defaults.staff_team, StaffTeam::Name("staff".into()));

        let custom = config
            .targets(
                "https://github.com/acme/starter",
                Some(&StaffTeam::Id(9)),
                Some("https://hooks.example.com/batch"),
            )
            .unwrap();
        assert_eq!(custom.webhook.url, "https://hooks.example.com/batch");
        assert_eq!(custom.staff_team, StaffTeam::Id(9));
    }

    #[test]
    fn missing_webhook_is_an_error() {
        let config = ClassforgeConfig::new();
        assert!(config.targets("https://github.com/acme/starter", None, None).is_err());
        assert!(config.targets(" ", None, Some("https://h")).is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = ClassforgeConfig::new();
        config.github.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
