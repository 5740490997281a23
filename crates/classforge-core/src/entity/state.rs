//! Persisted provisioning state for one team or individual project.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of persisted entity a description points back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Team-like entity owning a shared group repository.
    Team,
    /// Individual-project entity owning a single-student repository.
    Project,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Team => write!(f, "team"),
            Self::Project => write!(f, "project"),
        }
    }
}

/// Back-reference to the persisted record that receives provisioning state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn team(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Team,
            id: id.into(),
        }
    }

    pub fn project(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Project,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Browser URL; empty until provisioning completes.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    #[serde(default)]
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationRecord {
    /// Most recent failure; empty after a successful run.
    #[serde(default)]
    pub error: String,
}

/// External identifiers and last error for one entity.
///
/// Each workflow step that produces an identifier writes it here and saves
/// immediately, so a crash leaves the completed prefix intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedProvisioningState {
    #[serde(default)]
    pub repo: RepoRecord,
    #[serde(default)]
    pub team: TeamRecord,
    #[serde(default)]
    pub creation_record: CreationRecord,
}

impl PersistedProvisioningState {
    /// A non-empty `repo.url` means the repository must never be recreated.
    pub fn is_provisioned(&self) -> bool {
        !self.repo.url.is_empty()
    }

    /// A repository exists remotely (possibly without a persisted URL yet).
    pub fn has_repo(&self) -> bool {
        self.repo.id != 0 && !self.repo.name.is_empty()
    }

    pub fn has_team(&self) -> bool {
        self.team.id != 0
    }

    pub fn has_error(&self) -> bool {
        !self.creation_record.error.is_empty()
    }

    /// Overwrite the last error.
    pub fn record_error(&mut self, error: &impl fmt::Display) {
        self.creation_record.error = error.to_string();
    }

    pub fn clear_error(&mut self) {
        self.creation_record.error.clear();
    }
}
