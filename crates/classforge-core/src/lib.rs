//! Classforge Core Library
//!
//! Provisions per-team and per-student repositories in a hosting-provider
//! organization: repository creation, starter-content transplant, webhook
//! wiring, team membership and staff access, with persisted progress so a
//! partially failed run can be repaired by re-invocation.

pub mod config;
pub mod entity;
pub mod error;
pub mod github;
pub mod provision;
pub mod schedule;
pub mod transplant;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ClassforgeConfig, ConfigStore};

    // Entities
    pub use crate::entity::{
        EntityKind, EntityRef, EntityStore, FileEntityStore, GroupRepoDescription,
        MemoryEntityStore, PersistedProvisioningState, ProjectRepoDescription,
    };

    // Errors
    pub use crate::error::ProvisionError;

    // Remote API
    pub use crate::github::{ApiError, GitHubClient, GitHubSettings, HostingApi};

    // Provisioning
    pub use crate::provision::{
        BatchRunner, EntityOutcome, ProvisionTargets, Provisioner, RepairFacet, StaffTeam,
    };

    // Scheduling
    pub use crate::schedule::StaggerSchedule;

    // Transplant
    pub use crate::transplant::{GitTransplanter, TransplantOutcome, Transplanter};
}
