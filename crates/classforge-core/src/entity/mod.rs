//! Provisioning requests and the persisted state they write back.

mod description;
mod state;
mod store;

pub use description::{GroupRepoDescription, ProjectRepoDescription, Staggered};
pub use state::{
    CreationRecord, EntityKind, EntityRef, PersistedProvisioningState, RepoRecord, TeamRecord,
};
pub use store::{EntityStore, FileEntityStore, MemoryEntityStore, StoreError};
