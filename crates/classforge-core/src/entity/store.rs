//! Entity store seam.
//!
//! The real course records live elsewhere; workflows only need to load the
//! provisioning field group of one entity and save it back.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EntityKind, EntityRef, PersistedProvisioningState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize provisioning state: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("entity store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of [`PersistedProvisioningState`] values.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Current state; an unknown entity yields the empty state.
    async fn load(&self, entity: &EntityRef) -> Result<PersistedProvisioningState, StoreError>;

    async fn save(
        &self,
        entity: &EntityRef,
        state: &PersistedProvisioningState,
    ) -> Result<(), StoreError>;
}

/// On-disk layout: one table per entity kind, keyed by entity id.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    teams: BTreeMap<String, PersistedProvisioningState>,
    #[serde(default)]
    projects: BTreeMap<String, PersistedProvisioningState>,
}

impl StateDocument {
    fn table(&self, kind: EntityKind) -> &BTreeMap<String, PersistedProvisioningState> {
        match kind {
            EntityKind::Team => &self.teams,
            EntityKind::Project => &self.projects,
        }
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, PersistedProvisioningState> {
        match kind {
            EntityKind::Team => &mut self.teams,
            EntityKind::Project => &mut self.projects,
        }
    }
}

/// TOML-file backed store.
///
/// Saves are read-modify-write on the whole document, serialized by an async
/// mutex and committed with a rename so readers never see a torn file.
#[derive(Debug)]
pub struct FileEntityStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileEntityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every persisted entity, ordered by kind then id.
    pub async fn entries(
        &self,
    ) -> Result<Vec<(EntityRef, PersistedProvisioningState)>, StoreError> {
        let _guard = self.lock.lock().await;
        let document = self.read_document().await?;
        let teams = document
            .teams
            .into_iter()
            .map(|(id, state)| (EntityRef::team(id), state));
        let projects = document
            .projects
            .into_iter()
            .map(|(id, state)| (EntityRef::project(id), state));
        Ok(teams.chain(projects).collect())
    }

    async fn read_document(&self) -> Result<StateDocument, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(StateDocument::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_document(&self, document: &StateDocument) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(document)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let staging = self.path.with_extension("toml.tmp");
        tokio::fs::write(&staging, content)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FileEntityStore {
    async fn load(&self, entity: &EntityRef) -> Result<PersistedProvisioningState, StoreError> {
        let _guard = self.lock.lock().await;
        let document = self.read_document().await?;
        Ok(document
            .table(entity.kind)
            .get(&entity.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(
        &self,
        entity: &EntityRef,
        state: &PersistedProvisioningState,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document
            .table_mut(entity.kind)
            .insert(entity.id.clone(), state.clone());
        self.write_document(&document).await
    }
}

/// In-process store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    entries: Mutex<HashMap<EntityRef, PersistedProvisioningState>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite an entity's state.
    pub fn insert(&self, entity: EntityRef, state: PersistedProvisioningState) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(entity, state);
        }
    }

    /// Current state without going through the async trait.
    pub fn get(&self, entity: &EntityRef) -> Option<PersistedProvisioningState> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(entity).cloned())
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn load(&self, entity: &EntityRef) -> Result<PersistedProvisioningState, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        Ok(entries.get(entity).cloned().unwrap_or_default())
    }

    async fn save(
        &self,
        entity: &EntityRef,
        state: &PersistedProvisioningState,
    ) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        entries.insert(entity.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_returns_default_for_unknown_entity() {
        let store = MemoryEntityStore::new();
        let state = store.load(&EntityRef::team("missing")).await.unwrap();
        assert_eq!(state, PersistedProvisioningState::default());
    }

    #[tokio::test]
    async fn memory_store_keeps_kinds_apart() {
        let store = MemoryEntityStore::new();
        let mut state = PersistedProvisioningState::default();
        state.repo.id = 7;
        store.save(&EntityRef::team("x"), &state).await.unwrap();

        assert_eq!(store.load(&EntityRef::team("x")).await.unwrap().repo.id, 7);
        assert_eq!(store.load(&EntityRef::project("x")).await.unwrap().repo.id, 0);
    }
}
