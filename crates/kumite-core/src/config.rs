//! Configuration management for kumite
//!
//! Handles loading and validation of kumite.toml configuration files.
//! Every field carries a serde default so a partial (or absent) file still
//! yields a runnable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LogConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Serial port settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// Score aggregation settings
    #[serde(default)]
    pub aggregate: AggregateConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-friendly colored output
    Pretty,
    /// JSON lines
    Json,
}

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path (e.g. /dev/ttyUSB0, COM13)
    #[serde(default = "default_device")]
    pub device: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Per-read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Pause after a line-level read fault in milliseconds
    #[serde(default = "default_error_pause")]
    pub error_pause_ms: u64,

    /// Pause before a reconnect attempt in milliseconds
    #[serde(default = "default_reconnect_pause")]
    pub reconnect_pause_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout(),
            error_pause_ms: default_error_pause(),
            reconnect_pause_ms: default_reconnect_pause(),
        }
    }
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_read_timeout() -> u64 {
    1000
}

fn default_error_pause() -> u64 {
    100
}

fn default_reconnect_pause() -> u64 {
    1000
}

/// Score aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Labels that must all report before a cycle completes.
    /// Declaration order is the tie-break order for equal scores.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    /// Minimum interval between published predictions in milliseconds
    #[serde(default = "default_publish_interval")]
    pub publish_interval_ms: u64,

    /// Prediction served before the first publication
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
            publish_interval_ms: default_publish_interval(),
            placeholder: default_placeholder(),
        }
    }
}

fn default_labels() -> Vec<String> {
    vec![
        "Idle".to_string(),
        "gyakuZuki".to_string(),
        "kisamiZuki".to_string(),
    ]
}

fn default_publish_interval() -> u64 {
    1000
}

fn default_placeholder() -> String {
    "Waiting for prediction...".to_string()
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Must be set to `true` to bind on a non-localhost address
    #[serde(default)]
    pub allow_public_bind: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allow_public_bind: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate field values and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.device.is_empty() {
            return Err(ConfigError::Invalid("serial.device is empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("serial.baud_rate is zero".to_string()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "serial.read_timeout_ms is zero".to_string(),
            ));
        }
        if self.aggregate.labels.is_empty() {
            return Err(ConfigError::Invalid(
                "aggregate.labels is empty".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for label in &self.aggregate.labels {
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "aggregate.labels contains duplicate '{label}'"
                )));
            }
        }
        Ok(())
    }

    /// Render the configuration as TOML (used by `kumite config`).
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_device_contract() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.read_timeout_ms, 1000);
        assert_eq!(config.serial.error_pause_ms, 100);
        assert_eq!(config.serial.reconnect_pause_ms, 1000);
        assert_eq!(config.aggregate.publish_interval_ms, 1000);
        assert_eq!(config.server.port, 5000);
        assert_eq!(
            config.aggregate.labels,
            vec!["Idle", "gyakuZuki", "kisamiZuki"]
        );
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [serial]
            device = "/dev/ttyACM1"

            [server]
            port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(config.serial.device, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[aggregate]\nlabels = []").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_or_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("kumite.toml")).unwrap();
        assert_eq!(config.serial.device, "/dev/ttyUSB0");
    }

    #[test]
    fn duplicate_labels_rejected() {
        let mut config = Config::default();
        config.aggregate.labels = vec!["Idle".to_string(), "Idle".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_rendering_roundtrips() {
        let config = Config::default();
        let rendered = config.to_toml_string().unwrap();
        assert!(!rendered.is_empty());
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.aggregate.placeholder, config.aggregate.placeholder);
    }
}
