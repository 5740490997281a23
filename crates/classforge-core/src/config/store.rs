//! Config store for loading and saving classforge.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{ClassforgeConfig, parser, paths};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store at the platform default location.
    pub fn from_default_location() -> anyhow::Result<Self> {
        Ok(Self::at(paths::default_config_path()?))
    }

    pub fn at(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Default entity state path: `state.toml` beside the config file.
    pub fn sibling_state_path(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(|dir| dir.join(paths::STATE_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(paths::STATE_FILE_NAME))
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    pub fn load(&self) -> anyhow::Result<ClassforgeConfig> {
        if !self.config_path.exists() {
            return Ok(ClassforgeConfig::new());
        }
        parser::parse_config(&self.config_path)
    }

    pub fn save(&self, config: &ClassforgeConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
