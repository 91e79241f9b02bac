//! # Sync configuration DTO
//!
//! ## Responsibilities
//!
//! - Define the configuration data structures
//! - Map TOML onto them, falling back to the defaults below for missing keys
//!
//! No other validation happens here.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Bounded timeout applied to every remote gateway call.
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;
/// Edits inside this window coalesce into one autosave.
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 800;

/// Per-flow configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowConfig {
    /// Legacy key names or `{owner}` templates, scanned in order during recovery.
    pub legacy_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub remote_timeout: Duration,
    pub autosave_debounce: Duration,
    /// Root of the file-backed local store. Empty means "platform default".
    pub data_dir: PathBuf,
    /// Local store quota in bytes; 0 disables the quota.
    pub max_bytes: u64,
    pub log_dir: Option<PathBuf>,
    pub flows: BTreeMap<String, FlowConfig>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS),
            autosave_debounce: Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS),
            data_dir: PathBuf::new(),
            max_bytes: 0,
            log_dir: None,
            flows: BTreeMap::new(),
        }
    }
}

impl SyncConfig {
    /// Map a parsed TOML document onto the DTO.
    pub fn from_toml(toml_value: &toml::Value) -> anyhow::Result<Self> {
        let section = |name: &str, key: &str| toml_value.get(name).and_then(|s| s.get(key));
        let millis = |name: &str, key: &str, default: u64| {
            section(name, key)
                .and_then(|v| v.as_integer())
                .map(|v| v.max(0) as u64)
                .unwrap_or(default)
        };

        let flows = toml_value
            .get("flows")
            .and_then(|f| f.as_table())
            .map(|table| {
                table
                    .iter()
                    .map(|(name, flow)| {
                        let legacy_keys = flow
                            .get("legacy_keys")
                            .and_then(|v| v.as_array())
                            .map(|keys| {
                                keys.iter()
                                    .filter_map(|k| k.as_str().map(str::to_string))
                                    .collect()
                            })
                            .unwrap_or_default();
                        (name.clone(), FlowConfig { legacy_keys })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            remote_timeout: Duration::from_millis(millis(
                "remote",
                "timeout_ms",
                DEFAULT_REMOTE_TIMEOUT_MS,
            )),
            autosave_debounce: Duration::from_millis(millis(
                "draft",
                "autosave_debounce_ms",
                DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            )),
            data_dir: PathBuf::from(
                section("storage", "data_dir")
                    .and_then(|v| v.as_str())
                    .unwrap_or(""),
            ),
            max_bytes: millis("storage", "max_bytes", 0),
            log_dir: section("logging", "log_dir")
                .and_then(|v| v.as_str())
                .map(PathBuf::from),
            flows,
        })
    }

    pub fn flow(&self, name: &str) -> FlowConfig {
        self.flows.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_reads_all_sections() {
        let value: toml::Value = toml::from_str(
            r#"
            [remote]
            timeout_ms = 12000

            [draft]
            autosave_debounce_ms = 250

            [storage]
            data_dir = "/var/lib/wellsync"
            max_bytes = 1024

            [logging]
            log_dir = "/var/log/wellsync"

            [flows.onboarding]
            legacy_keys = ["old_flow_v1", "onboarding_backup:{owner}"]
            "#,
        )
        .unwrap();

        let config = SyncConfig::from_toml(&value).unwrap();

        assert_eq!(config.remote_timeout, Duration::from_secs(12));
        assert_eq!(config.autosave_debounce, Duration::from_millis(250));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/wellsync"));
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/wellsync")));
        assert_eq!(
            config.flow("onboarding").legacy_keys,
            vec!["old_flow_v1".to_string(), "onboarding_backup:{owner}".to_string()]
        );
    }

    #[test]
    fn test_from_toml_falls_back_to_defaults() {
        let value: toml::Value = toml::from_str("").unwrap();
        let config = SyncConfig::from_toml(&value).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(config.flow("missing").legacy_keys.is_empty());
    }
}
