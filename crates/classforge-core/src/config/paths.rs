//! Config path resolution helpers.

use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "classforge.toml";
pub const STATE_FILE_NAME: &str = "state.toml";

/// `<platform config dir>/classforge`
pub fn config_dir() -> anyhow::Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("classforge"))
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_lives_in_classforge_dir() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("classforge/classforge.toml"));
        }
    }
}
