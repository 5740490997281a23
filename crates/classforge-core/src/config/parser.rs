//! TOML parser with helpful error messages

use std::path::Path;

use anyhow::{Context, Result};

use super::schema::ClassforgeConfig;

/// Parse classforge.toml with detailed error messages
pub fn parse_config(path: &Path) -> Result<ClassforgeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse classforge.toml content from string
pub fn parse_config_str(content: &str) -> Result<ClassforgeConfig> {
    let config: ClassforgeConfig =
        toml::from_str(content).map_err(|e| located_error(&e, content))?;
    config.validate()?;
    Ok(config)
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &ClassforgeConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config to TOML")
}

/// Attach the offending line, with neighbours, to a TOML error.
pub(crate) fn located_error(error: &toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message();
    let Some(span) = error.span() else {
        return anyhow::anyhow!("TOML parsing error: {}", message);
    };
    let line = content[..span.start.min(content.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count()
        + 1;
    anyhow::anyhow!(
        "TOML parsing error at line {}:\n{}\n\nError: {}",
        line,
        excerpt(content, line),
        message
    )
}

/// Up to two lines either side of `line` (1-based), the target marked.
fn excerpt(content: &str, line: usize) -> String {
    content
        .lines()
        .enumerate()
        .skip(line.saturating_sub(3))
        .take(5)
        .map(|(i, text)| {
            let number = i + 1;
            let marker = if number == line { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, number, text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
