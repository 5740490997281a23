//! Workflow-level error taxonomy.
//!
//! Layer-specific errors (`ApiError`, `TransplantError`, `StoreError`) live
//! next to the code that produces them and are folded into
//! [`ProvisionError`] at the workflow boundary.

use thiserror::Error;

use crate::entity::StoreError;
use crate::github::ApiError;
use crate::transplant::TransplantError;

/// Errors surfaced by provisioning, repair and teardown workflows.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A hosting-provider API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A local git invocation (clone/commit/push) failed.
    #[error("local git operation failed: {0}")]
    LocalProcess(#[from] TransplantError),

    /// The entity already has a repository; creation was not attempted.
    #[error("repository already provisioned at {url}")]
    AlreadyProvisioned { url: String },

    /// Persisted state is missing an identifier a step depends on.
    #[error("inconsistent provisioning state: {0}")]
    InconsistentState(String),

    /// Reading or writing the persisted entity failed.
    #[error("failed to persist provisioning state: {0}")]
    Store(#[from] StoreError),

    /// The task driving the workflow panicked or was cancelled.
    #[error("provisioning task aborted: {0}")]
    Aborted(String),
}

impl ProvisionError {
    /// Whether this error means "nothing to do" for repair flows.
    pub fn is_already_provisioned(&self) -> bool {
        matches!(self, Self::AlreadyProvisioned { .. })
    }

    /// Whether retrying later could plausibly succeed without operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api(err) => err.is_transient(),
            _ => false,
        }
    }
}
