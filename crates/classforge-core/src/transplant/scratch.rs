//! Per-invocation scratch directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::TransplantError;

/// Root under which each transplant gets its own directory.
///
/// Directories are never shared: every [`allocate`](Self::allocate) call
/// yields a fresh [`TempDir`] that is removed when dropped, on success,
/// error, or cancellation alike.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scratch space under the system temp directory.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir().join("classforge"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn allocate(&self) -> Result<TempDir, TransplantError> {
        std::fs::create_dir_all(&self.root).map_err(TransplantError::Scratch)?;
        tempfile::Builder::new()
            .prefix("transplant-")
            .tempdir_in(&self.root)
            .map_err(TransplantError::Scratch)
    }
}
