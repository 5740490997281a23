//! Typed request and response payloads for the hosting-provider API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository as returned by the repos endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    /// Browser URL; this is what gets persisted as `repo.url`.
    pub html_url: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default)]
    pub private: bool,
}

/// Organization team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// Team membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// `active` or `pending` (invitation not yet accepted).
    pub state: String,
    #[serde(default)]
    pub role: String,
}

/// Repository permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Pull,
    Triage,
    Push,
    Maintain,
    Admin,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Triage => "triage",
            Self::Push => "push",
            Self::Maintain => "maintain",
            Self::Admin => "admin",
        }
    }
}

/// Installed repository webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub id: u64,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub config: HookConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Webhook to install on a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSpec {
    pub url: String,
    pub secret: Option<String>,
    pub events: Vec<String>,
}

impl HookSpec {
    /// Push-notification hook delivering JSON to `url`.
    pub fn push(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: None,
            events: vec!["push".to_string()],
        }
    }

    pub fn with_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    /// Request body for the create-hook endpoint.
    pub fn to_request_body(&self) -> serde_json::Value {
        let mut config = serde_json::json!({
            "url": self.url,
            "content_type": "json",
            "insecure_ssl": "0",
        });
        if let Some(secret) = &self.secret {
            config["secret"] = serde_json::Value::String(secret.clone());
        }
        serde_json::json!({
            "name": "web",
            "active": true,
            "events": self.events,
            "config": config,
        })
    }
}

/// Source-import progress (best-effort server-side import).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatus {
    pub status: String,
    #[serde(default)]
    pub status_text: Option<String>,
}

/// Commit list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetail,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: String,
    pub date: DateTime<Utc>,
}

impl Commit {
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        self.commit.author.as_ref().map(|author| author.date)
    }
}

/// Comment posted on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitComment {
    pub id: u64,
    #[serde(default)]
    pub html_url: String,
    pub body: String,
}
