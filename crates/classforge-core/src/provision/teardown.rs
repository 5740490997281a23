//! Administrative removal of a provisioned repository.

use tracing::{info, instrument};

use crate::entity::{EntityRef, PersistedProvisioningState, RepoRecord};
use crate::error::ProvisionError;

use super::Provisioner;

/// Delete the repository recorded on `entity` and reset its `repo` fields.
///
/// The team record is kept. An entity without a recorded repository, or
/// whose repository is already gone remotely, is reset without error.
#[instrument(skip(provisioner), fields(entity = %entity))]
pub async fn teardown(
    provisioner: &Provisioner,
    entity: &EntityRef,
) -> Result<PersistedProvisioningState, ProvisionError> {
    let mut state = provisioner.store().load(entity).await?;
    if state.repo.name.is_empty() {
        return Ok(state);
    }
    match provisioner.api().delete_repo(&state.repo.name).await {
        Ok(()) => info!(repo = %state.repo.name, "repository deleted"),
        Err(err) if err.is_not_found() => {
            info!(repo = %state.repo.name, "repository already absent")
        }
        Err(err) => return Err(err.into()),
    }
    state.repo = RepoRecord::default();
    provisioner.store().save(entity, &state).await?;
    Ok(state)
}
