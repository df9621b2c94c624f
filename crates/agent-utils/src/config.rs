//! Configuration file and environment helpers

use anyhow::Context as _;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load a TOML file into a configuration type
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
}

/// Parse TOML text into a configuration type
pub fn parse_toml<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
    Ok(toml::from_str(text)?)
}

/// Read a non-empty environment variable
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
