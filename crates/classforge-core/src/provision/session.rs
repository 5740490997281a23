//! Persisted-state handle and the remote steps shared by all workflows.

use tracing::{debug, info, warn};

use crate::entity::{EntityRef, PersistedProvisioningState};
use crate::error::ProvisionError;
use crate::github::{HookSpec, Permission};
use crate::transplant::TransplantOutcome;

use super::{Provisioner, StaffTeam};

/// One entity's state while a workflow or repair runs against it.
pub(crate) struct Session<'a> {
    provisioner: &'a Provisioner,
    entity: &'a EntityRef,
    state: PersistedProvisioningState,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        provisioner: &'a Provisioner,
        entity: &'a EntityRef,
        state: PersistedProvisioningState,
    ) -> Self {
        Self {
            provisioner,
            entity,
            state,
        }
    }

    pub(crate) fn state(&self) -> &PersistedProvisioningState {
        &self.state
    }

    pub(crate) fn into_state(self) -> PersistedProvisioningState {
        self.state
    }

    async fn persist(&self) -> Result<(), ProvisionError> {
        self.provisioner
            .store()
            .save(self.entity, &self.state)
            .await?;
        Ok(())
    }

    /// Record `error` as the entity's last error and hand it back.
    pub(crate) async fn fail(&mut self, error: ProvisionError) -> ProvisionError {
        warn!(entity = %self.entity, %error, "provisioning step failed");
        self.state.record_error(&error);
        if let Err(save_error) = self.persist().await {
            warn!(entity = %self.entity, error = %save_error, "could not persist failure");
        }
        error
    }

    /// Clear the last error and persist.
    pub(crate) async fn succeed(mut self) -> Result<PersistedProvisioningState, ProvisionError> {
        self.state.clear_error();
        if let Err(error) = self.persist().await {
            return Err(self.fail(error).await);
        }
        Ok(self.state)
    }

    pub(crate) fn repo_name(&self) -> Result<&str, ProvisionError> {
        if !self.state.has_repo() {
            return Err(ProvisionError::InconsistentState(format!(
                "{} has no repository recorded",
                self.entity
            )));
        }
        Ok(&self.state.repo.name)
    }

    pub(crate) fn team_id(&self) -> Result<u64, ProvisionError> {
        if !self.state.has_team() {
            return Err(ProvisionError::InconsistentState(format!(
                "{} has no team recorded",
                self.entity
            )));
        }
        Ok(self.state.team.id)
    }

    /// Create the repository, or adopt the one already recorded or already
    /// present under `name`.
    ///
    /// Returns the browser URL and whether the repository was created now.
    pub(crate) async fn ensure_repository(
        &mut self,
        name: &str,
    ) -> Result<(String, bool), ProvisionError> {
        let api = self.provisioner.api();
        if self.state.has_repo() {
            info!(entity = %self.entity, repo = %self.state.repo.name, "reusing recorded repository");
            return Ok((api.repo_url(&self.state.repo.name), false));
        }
        let (repo, created) = match api.create_repo(name).await {
            Ok(repo) => (repo, true),
            // Created by an earlier run that died before persisting the id.
            Err(err) if err.is_conflict() => match api.find_repo_by_name(name).await? {
                Some(repo) => (repo, false),
                None => return Err(err.into()),
            },
            Err(err) => return Err(err.into()),
        };
        if created {
            info!(entity = %self.entity, repo = %repo.name, id = repo.id, "repository created");
        } else {
            info!(entity = %self.entity, repo = %repo.name, id = repo.id, "adopted unrecorded repository");
        }
        self.state.repo.id = repo.id;
        self.state.repo.name = repo.name;
        self.persist().await?;
        Ok((repo.html_url, created))
    }

    /// Seed starter content. Adopted repositories only receive it while
    /// they are still pristine.
    pub(crate) async fn seed_content(
        &self,
        content_source: &str,
        fresh_repo: bool,
    ) -> Result<(), ProvisionError> {
        let api = self.provisioner.api();
        let destination = api.clone_url(self.repo_name()?);
        let transplanter = self.provisioner.transplanter();
        if fresh_repo {
            transplanter.transplant(content_source, &destination).await?;
            return Ok(());
        }
        match transplanter
            .transplant_if_pristine(content_source, &destination)
            .await?
        {
            TransplantOutcome::Applied => debug!(entity = %self.entity, "starter content re-applied"),
            TransplantOutcome::Skipped => {
                info!(entity = %self.entity, "repository already has work; starter content kept")
            }
        }
        Ok(())
    }

    /// Attach the webhook; adopted repositories get theirs replaced.
    pub(crate) async fn wire_webhook(
        &self,
        hook: &HookSpec,
        fresh_repo: bool,
    ) -> Result<(), ProvisionError> {
        if !fresh_repo {
            return self.replace_webhooks(hook).await;
        }
        let repo = self.repo_name()?;
        self.provisioner.api().add_hook(repo, hook).await?;
        Ok(())
    }

    /// Delete every hook on the repository, then add `hook` once.
    ///
    /// A delete failure aborts the step; a hook that is already gone counts
    /// as deleted.
    pub(crate) async fn replace_webhooks(&self, hook: &HookSpec) -> Result<(), ProvisionError> {
        let api = self.provisioner.api();
        let repo = self.repo_name()?;
        for existing in api.list_hooks(repo).await? {
            match api.delete_hook(repo, existing.id).await {
                Ok(()) => debug!(entity = %self.entity, hook = existing.id, "removed webhook"),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }
        api.add_hook(repo, hook).await?;
        info!(entity = %self.entity, url = %hook.url, "webhook attached");
        Ok(())
    }

    /// Create the collaboration team, or adopt the recorded one.
    pub(crate) async fn ensure_team(&mut self, name: &str) -> Result<u64, ProvisionError> {
        if self.state.has_team() {
            return Ok(self.state.team.id);
        }
        let api = self.provisioner.api();
        let team = match api.create_team(name).await {
            Ok(team) => team,
            // Created by an earlier run that died before persisting the id.
            Err(err) if err.is_conflict() => match api.find_team_by_name(name).await? {
                Some(team) => team,
                None => return Err(err.into()),
            },
            Err(err) => return Err(err.into()),
        };
        info!(entity = %self.entity, team = %team.name, id = team.id, "team ready");
        self.state.team.id = team.id;
        self.persist().await?;
        Ok(team.id)
    }

    pub(crate) async fn add_team_members(&self, members: &[String]) -> Result<(), ProvisionError> {
        let team_id = self.team_id()?;
        let api = self.provisioner.api();
        for member in members {
            let membership = api.add_team_member(team_id, member).await?;
            debug!(entity = %self.entity, %member, state = %membership.state, "member added");
        }
        Ok(())
    }

    pub(crate) async fn link_team(&self) -> Result<(), ProvisionError> {
        let team_id = self.team_id()?;
        let repo = self.repo_name()?;
        self.provisioner
            .api()
            .add_team_to_repo(team_id, repo, Permission::Push)
            .await?;
        Ok(())
    }

    pub(crate) async fn add_collaborator(&self, user: &str) -> Result<(), ProvisionError> {
        let repo = self.repo_name()?;
        self.provisioner
            .api()
            .add_collaborator(repo, user, Permission::Push)
            .await?;
        Ok(())
    }

    pub(crate) async fn link_staff(&self, staff: &StaffTeam) -> Result<(), ProvisionError> {
        let repo = self.repo_name()?;
        let api = self.provisioner.api();
        let staff_id = staff.resolve(api).await?;
        api.add_team_to_repo(staff_id, repo, Permission::Admin)
            .await?;
        Ok(())
    }

    /// Final step of provisioning: the URL marks the entity as provisioned.
    pub(crate) async fn persist_url(&mut self, url: String) -> Result<(), ProvisionError> {
        self.state.repo.url = url;
        self.state.clear_error();
        self.persist().await
    }
}
