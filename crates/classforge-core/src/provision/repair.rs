//! Repair: converge a partially provisioned entity without recreating what
//! already exists.
//!
//! Each [`RepairFacet`] is independently retriable. A facet run clears
//! `creation_record.error` on success and overwrites it on failure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::entity::{
    EntityKind, GroupRepoDescription, PersistedProvisioningState, ProjectRepoDescription,
};
use crate::error::ProvisionError;

use super::session::Session;
use super::{GroupWorkflow, ProjectWorkflow, ProvisionTargets, Provisioner};

/// Independently repairable piece of a provisioned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairFacet {
    /// Re-add every member to the recorded team (group only).
    Members,
    /// Re-link the recorded team to the repository with write access (group only).
    TeamLink,
    /// Re-grant the staff team admin access.
    StaffAccess,
    /// Delete all hooks and attach a fresh one.
    Webhook,
    /// Re-add the student as collaborator (project only).
    Collaborator,
}

/// Facets a default group repair runs on a provisioned team.
pub const GROUP_REPAIR_FACETS: &[RepairFacet] = &[RepairFacet::Members, RepairFacet::TeamLink];

/// Facets a default project repair runs on a provisioned project.
pub const PROJECT_REPAIR_FACETS: &[RepairFacet] = &[
    RepairFacet::Collaborator,
    RepairFacet::StaffAccess,
    RepairFacet::Webhook,
];

impl RepairFacet {
    pub fn applies_to(self, kind: EntityKind) -> bool {
        match self {
            Self::Members | Self::TeamLink => kind == EntityKind::Team,
            Self::Collaborator => kind == EntityKind::Project,
            Self::StaffAccess | Self::Webhook => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Members => "members",
            Self::TeamLink => "team-link",
            Self::StaffAccess => "staff-access",
            Self::Webhook => "webhook",
            Self::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for RepairFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepairFacet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "members" => Ok(Self::Members),
            "team-link" => Ok(Self::TeamLink),
            "staff-access" | "staff" => Ok(Self::StaffAccess),
            "webhook" => Ok(Self::Webhook),
            "collaborator" => Ok(Self::Collaborator),
            other => Err(format!(
                "unknown repair facet '{other}' (expected members, team-link, staff-access, webhook or collaborator)"
            )),
        }
    }
}

/// Repair one team.
///
/// A provisioned team gets its membership and team link re-applied. A team
/// whose run died midway is resumed through the state machine, adopting
/// whatever repository and team were already recorded. A URL assigned
/// outside this subsystem with nothing recorded is left alone.
#[instrument(skip_all, fields(entity = %description.entity))]
pub async fn repair_group(
    provisioner: &Provisioner,
    targets: &ProvisionTargets,
    description: &GroupRepoDescription,
) -> Result<PersistedProvisioningState, ProvisionError> {
    let state = provisioner.store().load(&description.entity).await?;
    if state.is_provisioned() {
        return run_group_facets(provisioner, targets, description, state, GROUP_REPAIR_FACETS)
            .await;
    }
    if !state.has_repo() && description.existing_url("").is_some() {
        info!("repository assigned externally; nothing to repair");
        return Ok(state);
    }
    GroupWorkflow::new(provisioner, targets, description, state)
        .run()
        .await
}

/// Run exactly `facets` against one team.
#[instrument(skip_all, fields(entity = %description.entity, ?facets))]
pub async fn repair_group_facets(
    provisioner: &Provisioner,
    targets: &ProvisionTargets,
    description: &GroupRepoDescription,
    facets: &[RepairFacet],
) -> Result<PersistedProvisioningState, ProvisionError> {
    let state = provisioner.store().load(&description.entity).await?;
    run_group_facets(provisioner, targets, description, state, facets).await
}

async fn run_group_facets(
    provisioner: &Provisioner,
    targets: &ProvisionTargets,
    description: &GroupRepoDescription,
    state: PersistedProvisioningState,
    facets: &[RepairFacet],
) -> Result<PersistedProvisioningState, ProvisionError> {
    let mut session = Session::new(provisioner, &description.entity, state);
    for &facet in facets {
        let result = match facet {
            RepairFacet::Members => session.add_team_members(&description.members).await,
            RepairFacet::TeamLink => session.link_team().await,
            RepairFacet::StaffAccess => session.link_staff(&targets.staff_team).await,
            RepairFacet::Webhook => session.replace_webhooks(&targets.webhook).await,
            RepairFacet::Collaborator => Err(unsupported(facet, EntityKind::Team)),
        };
        if let Err(error) = result {
            return Err(session.fail(error).await);
        }
        info!(entity = %description.entity, %facet, "facet repaired");
    }
    session.succeed().await
}

/// Repair one student repository.
#[instrument(skip_all, fields(entity = %description.entity))]
pub async fn repair_project(
    provisioner: &Provisioner,
    targets: &ProvisionTargets,
    description: &ProjectRepoDescription,
) -> Result<PersistedProvisioningState, ProvisionError> {
    let state = provisioner.store().load(&description.entity).await?;
    if state.is_provisioned() {
        return run_project_facets(
            provisioner,
            targets,
            description,
            state,
            PROJECT_REPAIR_FACETS,
        )
        .await;
    }
    ProjectWorkflow::new(provisioner, targets, description, state)
        .run()
        .await
}

/// Run exactly `facets` against one student repository.
#[instrument(skip_all, fields(entity = %description.entity, ?facets))]
pub async fn repair_project_facets(
    provisioner: &Provisioner,
    targets: &ProvisionTargets,
    description: &ProjectRepoDescription,
    facets: &[RepairFacet],
) -> Result<PersistedProvisioningState, ProvisionError> {
    let state = provisioner.store().load(&description.entity).await?;
    run_project_facets(provisioner, targets, description, state, facets).await
}

async fn run_project_facets(
    provisioner: &Provisioner,
    targets: &ProvisionTargets,
    description: &ProjectRepoDescription,
    state: PersistedProvisioningState,
    facets: &[RepairFacet],
) -> Result<PersistedProvisioningState, ProvisionError> {
    let mut session = Session::new(provisioner, &description.entity, state);
    for &facet in facets {
        let result = match facet {
            RepairFacet::Collaborator => session.add_collaborator(&description.student).await,
            RepairFacet::StaffAccess => session.link_staff(&targets.staff_team).await,
            RepairFacet::Webhook => session.replace_webhooks(&targets.webhook).await,
            RepairFacet::Members | RepairFacet::TeamLink => {
                Err(unsupported(facet, EntityKind::Project))
            }
        };
        if let Err(error) = result {
            return Err(session.fail(error).await);
        }
        info!(entity = %description.entity, %facet, "facet repaired");
    }
    session.succeed().await
}

fn unsupported(facet: RepairFacet, kind: EntityKind) -> ProvisionError {
    ProvisionError::InconsistentState(format!(
        "repair facet '{facet}' does not apply to {kind} entities"
    ))
}
