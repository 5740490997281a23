//! Starter-content transplant.
//!
//! Moves the contents of a starter repository into a freshly created
//! destination repository as one clean initial commit, using local git
//! rather than the provider's asynchronous import endpoint.

mod error;
mod git;
mod scratch;

use async_trait::async_trait;

pub use error::{TransplantError, TransplantStep};
pub use git::{GitTransplanter, STARTER_COMMIT_MESSAGE, authenticated_url, redact};
pub use scratch::ScratchSpace;

/// Result of the pristine-only transplant variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransplantOutcome {
    /// Starter content was pushed.
    Applied,
    /// Destination already holds members' work; left untouched.
    Skipped,
}

/// Seeds a destination repository with starter content.
#[async_trait]
pub trait Transplanter: Send + Sync {
    /// Unconditional transplant into a brand-new destination.
    async fn transplant(&self, source_url: &str, destination_url: &str)
    -> Result<(), TransplantError>;

    /// Transplant only when the destination still holds nothing but its
    /// initial auto-generated state.
    async fn transplant_if_pristine(
        &self,
        source_url: &str,
        destination_url: &str,
    ) -> Result<TransplantOutcome, TransplantError>;
}
