//! Runtime configuration (`classforge.toml`).

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use schema::{ClassforgeConfig, GitHubSection, ProvisioningSection, StoreSection};
pub use store::ConfigStore;
