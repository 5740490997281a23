//! Provisioning, repair and teardown workflows.
//!
//! - [`group`]: shared team repository state machine
//! - [`project`]: individual repository state machine
//! - [`repair`]: facet-scoped convergence of partially provisioned entities
//! - [`batch`]: staggered fan-out with one outcome per entity

pub mod batch;
pub mod group;
pub mod manifest;
pub mod project;
pub mod repair;
mod session;
pub mod teardown;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::EntityStore;
use crate::error::ProvisionError;
use crate::github::{ApiError, HookSpec, HostingApi};
use crate::transplant::Transplanter;

pub use batch::{BatchRunner, EntityOutcome, OutcomeSummary};
pub use group::{GroupStage, GroupWorkflow, provision_group};
pub use manifest::{GroupManifest, ProjectManifest};
pub use project::{ProjectStage, ProjectWorkflow, provision_project};
pub use repair::{
    RepairFacet, repair_group, repair_group_facets, repair_project, repair_project_facets,
};
pub use teardown::teardown;

/// Collaborators every workflow runs against.
#[derive(Clone)]
pub struct Provisioner {
    api: Arc<dyn HostingApi>,
    store: Arc<dyn EntityStore>,
    transplanter: Arc<dyn Transplanter>,
}

impl Provisioner {
    pub fn new(
        api: Arc<dyn HostingApi>,
        store: Arc<dyn EntityStore>,
        transplanter: Arc<dyn Transplanter>,
    ) -> Self {
        Self {
            api,
            store,
            transplanter,
        }
    }

    pub fn api(&self) -> &dyn HostingApi {
        self.api.as_ref()
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn transplanter(&self) -> &dyn Transplanter {
        self.transplanter.as_ref()
    }
}

/// Team granted elevated access to every provisioned repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaffTeam {
    Id(u64),
    /// Team name or slug, resolved through the paged team listing.
    Name(String),
}

impl StaffTeam {
    pub async fn resolve(&self, api: &dyn HostingApi) -> Result<u64, ProvisionError> {
        match self {
            Self::Id(id) => Ok(*id),
            Self::Name(name) => match api.find_team_by_name(name).await? {
                Some(team) => Ok(team.id),
                None => Err(ApiError::NotFound {
                    path: format!("staff team '{name}'"),
                }
                .into()),
            },
        }
    }
}

impl Default for StaffTeam {
    fn default() -> Self {
        Self::Name("staff".to_string())
    }
}

/// Per-batch inputs shared by every workflow in the batch.
#[derive(Debug, Clone)]
pub struct ProvisionTargets {
    /// Starter repository transplanted into each new repository.
    pub content_source: String,
    pub staff_team: StaffTeam,
    /// Push-notification webhook attached to each repository.
    pub webhook: HookSpec,
}

impl ProvisionTargets {
    pub fn new(
        content_source: impl Into<String>,
        staff_team: StaffTeam,
        webhook: HookSpec,
    ) -> Self {
        Self {
            content_source: content_source.into(),
            staff_team,
            webhook,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_team_deserializes_id_or_name() {
        #[derive(Deserialize)]
        struct Wrapper {
            staff: StaffTeam,
        }
        let by_id: Wrapper = toml::from_str("staff = 42").unwrap();
        assert_eq!(by_id.staff, StaffTeam::Id(42));
        let by_name: Wrapper = toml::from_str("staff = \"course-staff\"").unwrap();
        assert_eq!(by_name.staff, StaffTeam::Name("course-staff".to_string()));
    }
}
