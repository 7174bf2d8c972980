//! Configuration management
//!
//! Loading, validation, and defaults for the Ludo configuration.
//! Configuration is stored in TOML format at ~/.ludo/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **oracle**: Decision-oracle endpoint settings
//! - **device**: Device link (WebSocket) settings
//! - **search**: Search timing knobs — guard deadlines and per-step
//!   timeouts. The exact durations are tuned empirically and are
//!   deliberately configuration, not constants; the only structural
//!   assumption is "scoped guard shorter than global guard".
//! - **context**: Conversation window bounds

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Failed to read config at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config at {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config at {path:?}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Decision-oracle endpoint settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Device link settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Search timing settings
    #[serde(default)]
    pub search: SearchTimingConfig,

    /// Conversation context settings
    #[serde(default)]
    pub context: ContextConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Decision-oracle endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint
    #[serde(default = "default_oracle_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_base_url(),
            model: default_oracle_model(),
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

/// Device link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// WebSocket URL of the game-launching appliance
    #[serde(default = "default_device_url")]
    pub url: String,

    /// Optional auth token sent on connect
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Delay between reconnect attempts, in seconds
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: default_device_url(),
            auth_token: None,
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

/// Search timing configuration
///
/// Guard deadlines bound a whole multi-step sequence; step timeouts
/// bound one outstanding request. The first step gets a longer
/// allowance than later steps, reflecting device cold-start latency.
/// Global (unscoped) searches fan out across every system on the
/// device and are slower, so they get the longer guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTimingConfig {
    /// Guard deadline for system-scoped search sequences, in seconds
    #[serde(default = "default_scoped_guard_secs")]
    pub scoped_guard_secs: u64,

    /// Guard deadline for global (unscoped) search sequences, in seconds
    #[serde(default = "default_global_guard_secs")]
    pub global_guard_secs: u64,

    /// Timeout for the first search step, in seconds
    #[serde(default = "default_first_step_timeout_secs")]
    pub first_step_timeout_secs: u64,

    /// Timeout for second and later search steps, in seconds
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    /// Timeout for the last-resort fallback search, in seconds
    #[serde(default = "default_fallback_timeout_secs")]
    pub fallback_timeout_secs: u64,
}

impl Default for SearchTimingConfig {
    fn default() -> Self {
        Self {
            scoped_guard_secs: default_scoped_guard_secs(),
            global_guard_secs: default_global_guard_secs(),
            first_step_timeout_secs: default_first_step_timeout_secs(),
            step_timeout_secs: default_step_timeout_secs(),
            fallback_timeout_secs: default_fallback_timeout_secs(),
        }
    }
}

impl SearchTimingConfig {
    /// Guard deadline for a sequence, by scope
    pub fn guard_deadline(&self, system_scoped: bool) -> Duration {
        if system_scoped {
            Duration::from_secs(self.scoped_guard_secs)
        } else {
            Duration::from_secs(self.global_guard_secs)
        }
    }

    /// Per-step timeout, by position in the sequence
    pub fn step_timeout(&self, first_step: bool) -> Duration {
        if first_step {
            Duration::from_secs(self.first_step_timeout_secs)
        } else {
            Duration::from_secs(self.step_timeout_secs)
        }
    }

    /// Timeout for the unscoped fallback search
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}

/// Conversation context configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum number of recent conversation turns carried per run
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_oracle_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_oracle_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_oracle_timeout_secs() -> u64 {
    20
}

fn default_device_url() -> String {
    "ws://mister.local:7497".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_scoped_guard_secs() -> u64 {
    8
}

fn default_global_guard_secs() -> u64 {
    15
}

fn default_first_step_timeout_secs() -> u64 {
    4
}

fn default_step_timeout_secs() -> u64 {
    2
}

fn default_fallback_timeout_secs() -> u64 {
    10
}

fn default_history_window() -> usize {
    8
}

impl Config {
    /// Default config file path: ~/.ludo/config.toml
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".ludo").join("config.toml"))
    }

    /// Load configuration from the default location, writing a default
    /// file first if none exists.
    pub fn load_or_create() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if !path.exists() {
            let config = Self::default();
            config.save_to_path(&path)?;
            return Ok(config);
        }
        Self::load_from_path(&path)
    }

    /// Load configuration from an explicit path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Write this configuration to the given path, creating parent
    /// directories as needed.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let body = toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, body).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.search.scoped_guard_secs == 0 || self.search.global_guard_secs == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: "search guard deadlines must be non-zero".to_string(),
            });
        }
        if self.search.first_step_timeout_secs == 0 || self.search.step_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: "search step timeouts must be non-zero".to_string(),
            });
        }
        if self.context.history_window == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: "context.history_window must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_timings() {
        let config = Config::default();
        assert!(config.search.guard_deadline(true) < config.search.guard_deadline(false));
        assert!(config.search.step_timeout(true) > config.search.step_timeout(false));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.search.scoped_guard_secs = 3;
        config.device.auth_token = Some("secret".to_string());
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.search.scoped_guard_secs, 3);
        assert_eq!(loaded.device.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[search]\nglobal_guard_secs = 30\n").unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.search.global_guard_secs, 30);
        assert_eq!(loaded.search.scoped_guard_secs, default_scoped_guard_secs());
        assert_eq!(loaded.core.log_level, "info");
    }

    #[test]
    fn test_zero_guard_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[search]\nscoped_guard_secs = 0\n").unwrap();

        assert!(matches!(
            Config::load_from_path(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
