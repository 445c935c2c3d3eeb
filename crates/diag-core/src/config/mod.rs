//! Configuration management for itch-diag

mod paths;
mod probe;
pub mod serde_utils;

pub use paths::PathsConfig;
pub use probe::ProbeConfig;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagConfig {
    /// Timeouts and limits of the butlerd probe
    pub probe: ProbeConfig,
    /// Overrides for the itch/butler install layout
    pub paths: PathsConfig,
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("itch-diag")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the configuration at `path`, or the default location when `None`.
///
/// A missing file at the default location yields the defaults; a missing
/// file that was asked for explicitly is an error.
pub fn load_or_default(path: Option<&Path>) -> Result<DiagConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                load_config(&default_path)
            } else {
                tracing::debug!("No config at {:?}, using defaults", default_path);
                Ok(DiagConfig::default())
            }
        }
    }
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_protocol::TransportKind;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: DiagConfig = toml::from_str("").unwrap();
        assert_eq!(config.probe.handshake_timeout, Duration::from_secs(5));
        assert!(config.paths.app_data_dir.is_none());
    }

    #[test]
    fn test_partial_probe_section() {
        let config: DiagConfig = toml::from_str(
            r#"
[probe]
handshake_timeout = 2
shutdown_grace = 250
transport = "http"

[paths]
database = "/tmp/butler.db"
"#,
        )
        .unwrap();
        assert_eq!(config.probe.handshake_timeout, Duration::from_secs(2));
        assert_eq!(config.probe.shutdown_grace, Duration::from_millis(250));
        assert_eq!(config.probe.transport, Some(TransportKind::Http));
        assert_eq!(config.probe.call_timeout, Duration::from_secs(10));
        assert_eq!(config.paths.database, Some(PathBuf::from("/tmp/butler.db")));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = DiagConfig::default();
        config.probe.call_timeout = Duration::from_secs(42);
        save_config(&path, &config).unwrap();

        let loaded: DiagConfig = load_config(&path).unwrap();
        assert_eq!(loaded.probe.call_timeout, Duration::from_secs(42));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_or_default(Some(&path)),
            Err(ConfigError::NotFound(p)) if p == path
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[probe\nbroken").unwrap();
        assert!(matches!(
            load_config::<DiagConfig>(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
