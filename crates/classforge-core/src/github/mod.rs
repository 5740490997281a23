//! Hosting-provider (GitHub) API access.
//!
//! - [`HostingApi`]: the operations the provisioning workflows depend on
//! - [`GitHubClient`]: reqwest implementation against the REST API
//! - [`pagination`]: Link-header driven page resolution

mod api;
mod client;
mod error;
pub mod pagination;
mod types;

pub use api::HostingApi;
pub use client::{
    DEFAULT_API_URL, DEFAULT_TIMEOUT, DEFAULT_WEB_URL, GitHubClient, GitHubSettings,
};
pub use error::{ApiError, ApiResult};
pub use types::{
    Commit, CommitAuthor, CommitComment, CommitDetail, Hook, HookConfig, HookSpec, ImportStatus,
    Membership, Permission, Repository, Team,
};
