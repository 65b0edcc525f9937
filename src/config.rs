//! Engine configuration loaded from `~/.config/streamscout/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default companion app address (loopback only).
pub const DEFAULT_APP_ADDRESS: &str = "127.0.0.1:34567";

/// Tunables for scanning and delivery.
///
/// Every field has a default, so a partial file (or no file) is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Quiet period after the last relevant DOM mutation before rescanning.
    pub debounce_ms: u64,
    /// Periodic rescan / URL poll interval.
    pub poll_interval_ms: u64,
    /// Lower bound between two scans of the same page.
    pub min_scan_gap_ms: u64,
    /// Recursion cap for nested URL extraction.
    pub max_nested_depth: usize,
    /// Session store capacity (newest first).
    pub store_capacity: usize,
    /// `host:port` of the companion app.
    pub app_address: String,
    pub delivery_timeout_ms: u64,
    /// Forward every new record to the companion app as it is stored.
    pub auto_send: bool,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            poll_interval_ms: 3000,
            min_scan_gap_ms: 250,
            max_nested_depth: 8,
            store_capacity: 100,
            app_address: DEFAULT_APP_ADDRESS.to_string(),
            delivery_timeout_ms: 5000,
            auto_send: false,
        }
    }
}

impl ScoutConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn min_scan_gap(&self) -> Duration {
        Duration::from_millis(self.min_scan_gap_ms)
    }

    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// Load the configuration file, falling back to defaults if it doesn't exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<ScoutConfig> {
    load_config_from(&config_path())
}

/// Load from an explicit path. A missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &std::path::Path) -> Result<ScoutConfig> {
    if !path.exists() {
        return Ok(ScoutConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
}

/// Return the path to the config file.
#[must_use]
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streamscout")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config: ScoutConfig = toml::from_str("").unwrap();
        assert_eq!(config, ScoutConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r#"
store_capacity = 20
app_address = "127.0.0.1:40000"
auto_send = true
"#;
        let config: ScoutConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store_capacity, 20);
        assert_eq!(config.app_address, "127.0.0.1:40000");
        assert!(config.auto_send);
        assert_eq!(config.debounce_ms, 500);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(toml::from_str::<ScoutConfig>("debounce_ms = \"soon\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("streamscout-does-not-exist").join("config.toml");
        assert_eq!(load_config_from(&path).unwrap(), ScoutConfig::default());
    }

    #[test]
    fn invalid_file_reports_path() {
        let dir = std::env::temp_dir().join(format!("streamscout-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "store_capacity = [").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn config_path_ends_with_crate_dir() {
        assert!(config_path().ends_with("streamscout/config.toml"));
    }
}
