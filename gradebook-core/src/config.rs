//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/gradebook/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/gradebook/` (~/.config/gradebook/)
//! - Data: `$XDG_DATA_HOME/gradebook/` (~/.local/share/gradebook/)
//! - State/Logs: `$XDG_STATE_HOME/gradebook/` (~/.local/state/gradebook/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Override path for the records database file
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the effective database path: the configured override, or the
    /// XDG default.
    pub fn effective_database_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/gradebook/config.toml` (~/.config/gradebook/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("gradebook").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/gradebook/` (~/.local/share/gradebook/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("gradebook")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/gradebook/` (~/.local/state/gradebook/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("gradebook")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/gradebook/records.db` (~/.local/share/gradebook/records.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("records.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/gradebook/gradebook.log` (~/.local/state/gradebook/gradebook.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("gradebook.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.storage.path.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.max_files, 5);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[storage]
path = "/tmp/test-records.db"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.storage.path.as_deref(),
            Some(std::path::Path::new("/tmp/test-records.db"))
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.effective_database_path(),
            PathBuf::from("/tmp/test-records.db")
        );
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config
            .effective_database_path()
            .ends_with("gradebook/records.db"));
    }
}
