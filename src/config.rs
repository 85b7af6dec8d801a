//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{RadScopeError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// MQTT broker and subscription configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Device-specific wildcard topic
    #[serde(default = "default_device_topic")]
    pub device_topic: String,

    /// Fixed fallback/demo topic, subscribed alongside the device topic
    #[serde(default = "default_demo_topic")]
    pub demo_topic: String,

    /// Prefix for the generated unique client identifier
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Fixed delay between reconnect attempts
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

/// Live telemetry state configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Rolling graph buffer capacity (points kept for charting)
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Bounded recent-readings diagnostics list capacity
    #[serde(default = "default_recent_len")]
    pub recent_len: usize,
}

/// On-disk log store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Base directory for the date-partitioned log store
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// UTC offset in minutes applied when formatting sample timestamps.
    /// When absent, the runtime's local offset is used. Set to 330 to
    /// reproduce the device firmware's fixed UTC+5:30 behavior.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

/// Session logging defaults
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Default sampling cadence in seconds
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,

    /// Default session time limit in hours (0 = unbounded)
    #[serde(default = "default_limit_hours")]
    pub default_limit_hours: u64,

    /// When set, the binary starts a logging session with this name on boot
    #[serde(default)]
    pub autostart_name: Option<String>,
}

// Default value functions
fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 1883 }
fn default_device_topic() -> String { "radscope/+/telemetry".to_string() }
fn default_demo_topic() -> String { "radscope/demo/telemetry".to_string() }
fn default_client_id_prefix() -> String { "radscope".to_string() }
fn default_connect_timeout_ms() -> u64 { 5000 }
fn default_reconnect_interval_ms() -> u64 { 2000 }
fn default_keep_alive_secs() -> u64 { 30 }

fn default_history_len() -> usize { 10 }
fn default_recent_len() -> usize { 50 }

fn default_base_dir() -> String { "./data".to_string() }

fn default_interval_secs() -> u64 { 1 }
fn default_limit_hours() -> u64 { 0 }

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            device_topic: default_device_topic(),
            demo_topic: default_demo_topic(),
            client_id_prefix: default_client_id_prefix(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            history_len: default_history_len(),
            recent_len: default_recent_len(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            utc_offset_minutes: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: default_interval_secs(),
            default_limit_hours: default_limit_hours(),
            autostart_name: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use radscope::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to built-in
    /// defaults when the file does not exist.
    ///
    /// Parse and validation failures in an existing file are still errors;
    /// only a missing file falls back.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "config file {} not found, using built-in defaults",
                    path.as_ref().display()
                );
                Ok(Config::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`RadScopeError::InvalidSession`] for out-of-range session
    /// defaults and [`RadScopeError::Transport`] for unusable MQTT settings.
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.port == 0 {
            return Err(RadScopeError::Transport("mqtt.port must be nonzero".into()));
        }
        if self.mqtt.host.trim().is_empty() {
            return Err(RadScopeError::Transport("mqtt.host must be set".into()));
        }
        if self.telemetry.history_len == 0 {
            return Err(RadScopeError::InvalidSession(
                "telemetry.history_len must be >= 1".into(),
            ));
        }
        if self.telemetry.recent_len == 0 {
            return Err(RadScopeError::InvalidSession(
                "telemetry.recent_len must be >= 1".into(),
            ));
        }
        if self.session.default_interval_secs < 1 {
            return Err(RadScopeError::InvalidSession(
                "session.default_interval_secs must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.device_topic, "radscope/+/telemetry");
        assert_eq!(config.mqtt.demo_topic, "radscope/demo/telemetry");
        assert_eq!(config.telemetry.history_len, 10);
        assert_eq!(config.telemetry.recent_len, 50);
        assert_eq!(config.storage.base_dir, "./data");
        assert!(config.storage.utc_offset_minutes.is_none());
        assert_eq!(config.session.default_interval_secs, 1);
        assert_eq!(config.session.default_limit_hours, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[mqtt]
host = "broker.lan"
port = 8883

[storage]
base_dir = "/var/lib/radscope"
utc_offset_minutes = 330

[telemetry]
history_len = 20
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.mqtt.host, "broker.lan");
        assert_eq!(config.mqtt.port, 8883);
        // Unspecified fields take defaults
        assert_eq!(config.mqtt.keep_alive_secs, 30);
        assert_eq!(config.storage.base_dir, "/var/lib/radscope");
        assert_eq!(config.storage.utc_offset_minutes, Some(330));
        assert_eq!(config.telemetry.history_len, 20);
        assert_eq!(config.telemetry.recent_len, 50);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = Config::load_or_default("/nonexistent/radscope.toml").unwrap();
        assert_eq!(config.mqtt.port, 1883);
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = Config::default();
        config.mqtt.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_history() {
        let mut config = Config::default();
        config.telemetry.history_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not toml at all [[").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
}
