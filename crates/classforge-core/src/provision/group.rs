//! Shared team repository provisioning as an explicit state machine.

use std::fmt;

use serde::Serialize;
use tracing::{info, instrument};

use crate::entity::{GroupRepoDescription, PersistedProvisioningState};
use crate::error::ProvisionError;

use super::session::Session;
use super::{ProvisionTargets, Provisioner};

/// Stages of group provisioning, in the only order they may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupStage {
    Idle,
    RepoCreated,
    ContentTransplanted,
    WebhookAttached,
    TeamCreated,
    MembersAdded,
    TeamLinkedToRepo,
    StaffLinkedToRepo,
    RepoUrlPersisted,
    Complete,
    Failed,
}

impl GroupStage {
    /// Happy-path successor; `None` for terminal stages.
    pub fn next(self) -> Option<Self> {
        use GroupStage::*;
        match self {
            Idle => Some(RepoCreated),
            RepoCreated => Some(ContentTransplanted),
            ContentTransplanted => Some(WebhookAttached),
            WebhookAttached => Some(TeamCreated),
            TeamCreated => Some(MembersAdded),
            MembersAdded => Some(TeamLinkedToRepo),
            TeamLinkedToRepo => Some(StaffLinkedToRepo),
            StaffLinkedToRepo => Some(RepoUrlPersisted),
            RepoUrlPersisted => Some(Complete),
            Complete | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for GroupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One team's provisioning run.
///
/// Every stage whose action yields an identifier persists it before the
/// stage is left. On failure the error is persisted once, the machine parks
/// in [`GroupStage::Failed`], and completed work is kept for repair.
///
/// A run over an entity whose repository is already recorded adopts it
/// instead of creating one; starter content and webhooks are then applied in
/// their non-destructive forms.
pub struct GroupWorkflow<'a> {
    session: Session<'a>,
    targets: &'a ProvisionTargets,
    description: &'a GroupRepoDescription,
    stage: GroupStage,
    fresh_repo: bool,
    repo_url: String,
}

impl<'a> GroupWorkflow<'a> {
    pub fn new(
        provisioner: &'a Provisioner,
        targets: &'a ProvisionTargets,
        description: &'a GroupRepoDescription,
        state: PersistedProvisioningState,
    ) -> Self {
        Self {
            session: Session::new(provisioner, &description.entity, state),
            targets,
            description,
            stage: GroupStage::Idle,
            fresh_repo: false,
            repo_url: String::new(),
        }
    }

    pub fn stage(&self) -> GroupStage {
        self.stage
    }

    pub fn state(&self) -> &PersistedProvisioningState {
        self.session.state()
    }

    /// Execute the current stage's action and move to its successor.
    ///
    /// Errors leave the stage unchanged; [`run`](Self::run) turns them into
    /// the `Failed` transition.
    pub async fn advance(&mut self) -> Result<GroupStage, ProvisionError> {
        let next = match self.stage {
            GroupStage::Idle => {
                let (url, fresh) = self
                    .session
                    .ensure_repository(&self.description.repo_name)
                    .await?;
                self.repo_url = url;
                self.fresh_repo = fresh;
                GroupStage::RepoCreated
            }
            GroupStage::RepoCreated => {
                self.session
                    .seed_content(&self.targets.content_source, self.fresh_repo)
                    .await?;
                GroupStage::ContentTransplanted
            }
            GroupStage::ContentTransplanted => {
                self.session
                    .wire_webhook(&self.targets.webhook, self.fresh_repo)
                    .await?;
                GroupStage::WebhookAttached
            }
            GroupStage::WebhookAttached => {
                self.session
                    .ensure_team(&self.description.team_name)
                    .await?;
                GroupStage::TeamCreated
            }
            GroupStage::TeamCreated => {
                self.session
                    .add_team_members(&self.description.members)
                    .await?;
                GroupStage::MembersAdded
            }
            GroupStage::MembersAdded => {
                self.session.link_team().await?;
                GroupStage::TeamLinkedToRepo
            }
            GroupStage::TeamLinkedToRepo => {
                self.session.link_staff(&self.targets.staff_team).await?;
                GroupStage::StaffLinkedToRepo
            }
            GroupStage::StaffLinkedToRepo => {
                let url = std::mem::take(&mut self.repo_url);
                self.session.persist_url(url).await?;
                GroupStage::RepoUrlPersisted
            }
            GroupStage::RepoUrlPersisted => GroupStage::Complete,
            GroupStage::Complete | GroupStage::Failed => return Ok(self.stage),
        };
        info!(entity = %self.description.entity, from = %self.stage, to = %next, "stage complete");
        self.stage = next;
        Ok(next)
    }

    /// Drive the machine to `Complete` or `Failed`.
    pub async fn run(mut self) -> Result<PersistedProvisioningState, ProvisionError> {
        while !self.stage.is_terminal() {
            if let Err(error) = self.advance().await {
                self.stage = GroupStage::Failed;
                return Err(self.session.fail(error).await);
            }
        }
        Ok(self.session.into_state())
    }
}

/// Provision one team from scratch.
///
/// Refuses without touching anything when the entity already has a
/// repository URL.
#[instrument(skip_all, fields(entity = %description.entity, repo = %description.repo_name))]
pub async fn provision_group(
    provisioner: &Provisioner,
    targets: &ProvisionTargets,
    description: &GroupRepoDescription,
) -> Result<PersistedProvisioningState, ProvisionError> {
    let state = provisioner.store().load(&description.entity).await?;
    if let Some(url) = description.existing_url(&state.repo.url) {
        return Err(ProvisionError::AlreadyProvisioned {
            url: url.to_string(),
        });
    }
    GroupWorkflow::new(provisioner, targets, description, state)
        .run()
        .await
}
