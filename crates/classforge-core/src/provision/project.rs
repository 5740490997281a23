//! Individual (single-student) repository provisioning.

use std::fmt;

use serde::Serialize;
use tracing::{info, instrument};

use crate::entity::{PersistedProvisioningState, ProjectRepoDescription};
use crate::error::ProvisionError;

use super::session::Session;
use super::{ProvisionTargets, Provisioner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProjectStage {
    Idle,
    RepoCreated,
    ContentTransplanted,
    WebhookAttached,
    CollaboratorAdded,
    StaffLinkedToRepo,
    RepoUrlPersisted,
    Complete,
    Failed,
}

impl ProjectStage {
    pub fn next(self) -> Option<Self> {
        use ProjectStage::*;
        match self {
            Idle => Some(RepoCreated),
            RepoCreated => Some(ContentTransplanted),
            ContentTransplanted => Some(WebhookAttached),
            WebhookAttached => Some(CollaboratorAdded),
            CollaboratorAdded => Some(StaffLinkedToRepo),
            StaffLinkedToRepo => Some(RepoUrlPersisted),
            RepoUrlPersisted => Some(Complete),
            Complete | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for ProjectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One student's provisioning run. Same persistence and failure rules as
/// [`GroupWorkflow`](super::GroupWorkflow), with a direct collaborator grant
/// in place of team creation.
pub struct ProjectWorkflow<'a> {
    session: Session<'a>,
    targets: &'a ProvisionTargets,
    description: &'a ProjectRepoDescription,
    stage: ProjectStage,
    fresh_repo: bool,
    repo_url: String,
}

impl<'a> ProjectWorkflow<'a> {
    pub fn new(
        provisioner: &'a Provisioner,
        targets: &'a ProvisionTargets,
        description: &'a ProjectRepoDescription,
        state: PersistedProvisioningState,
    ) -> Self {
        Self {
            session: Session::new(provisioner, &description.entity, state),
            targets,
            description,
            stage: ProjectStage::Idle,
            fresh_repo: false,
            repo_url: String::new(),
        }
    }

    pub fn stage(&self) -> ProjectStage {
        self.stage
    }

    pub fn state(&self) -> &PersistedProvisioningState {
        self.session.state()
    }

    pub async fn advance(&mut self) -> Result<ProjectStage, ProvisionError> {
        let next = match self.stage {
            ProjectStage::Idle => {
                let (url, fresh) = self
                    .session
                    .ensure_repository(&self.description.repo_name)
                    .await?;
                self.repo_url = url;
                self.fresh_repo = fresh;
                ProjectStage::RepoCreated
            }
            ProjectStage::RepoCreated => {
                self.session
                    .seed_content(&self.targets.content_source, self.fresh_repo)
                    .await?;
                ProjectStage::ContentTransplanted
            }
            ProjectStage::ContentTransplanted => {
                self.session
                    .wire_webhook(&self.targets.webhook, self.fresh_repo)
                    .await?;
                ProjectStage::WebhookAttached
            }
            ProjectStage::WebhookAttached => {
                self.session
                    .add_collaborator(&self.description.student)
                    .await?;
                ProjectStage::CollaboratorAdded
            }
            ProjectStage::CollaboratorAdded => {
                self.session.link_staff(&self.targets.staff_team).await?;
                ProjectStage::StaffLinkedToRepo
            }
            ProjectStage::StaffLinkedToRepo => {
                let url = std::mem::take(&mut self.repo_url);
                self.session.persist_url(url).await?;
                ProjectStage::RepoUrlPersisted
            }
            ProjectStage::RepoUrlPersisted => ProjectStage::Complete,
            ProjectStage::Complete | ProjectStage::Failed => return Ok(self.stage),
        };
        info!(entity = %self.description.entity, from = %self.stage, to = %next, "stage complete");
        self.stage = next;
        Ok(next)
    }

    pub async fn run(mut self) -> Result<PersistedProvisioningState, ProvisionError> {
        while !self.stage.is_terminal() {
            if let Err(error) = self.advance().await {
                self.stage = ProjectStage::Failed;
                return Err(self.session.fail(error).await);
            }
        }
        Ok(self.session.into_state())
    }
}

/// Provision one student repository from scratch.
#[instrument(skip_all, fields(entity = %description.entity, repo = %description.repo_name))]
pub async fn provision_project(
    provisioner: &Provisioner,
    targets: &ProvisionTargets,
    description: &ProjectRepoDescription,
) -> Result<PersistedProvisioningState, ProvisionError> {
    let state = provisioner.store().load(&description.entity).await?;
    if state.is_provisioned() {
        return Err(ProvisionError::AlreadyProvisioned {
            url: state.repo.url,
        });
    }
    ProjectWorkflow::new(provisioner, targets, description, state)
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_stages_skip_team_creation() {
        let mut stage = ProjectStage::Idle;
        let mut count = 1;
        while let Some(next) = stage.next() {
            count += 1;
            stage = next;
        }
        assert_eq!(count, 8);
        assert_eq!(stage, ProjectStage::Complete);
    }
}
