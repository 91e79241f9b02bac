//! # Configuration loader
//!
//! Reads the TOML file and maps it onto [`SyncConfig`]. Defaults for missing
//! keys live in the DTO; nothing is validated here.

use std::path::Path;

use anyhow::Context;
use ws_core::SyncConfig;

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML.
pub fn load_config(config_path: impl AsRef<Path>) -> anyhow::Result<SyncConfig> {
    let config_path = config_path.as_ref();
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let toml_value: toml::Value =
        toml::from_str(&content).context("Failed to parse config as TOML")?;
    SyncConfig::from_toml(&toml_value)
}
