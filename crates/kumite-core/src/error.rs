//! Error types for kumite-core

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kumite-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Logging initialization errors
    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LogError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("failed to render config as TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Serial-side errors.
///
/// Faults come in two tiers with different handling:
/// - connection-level ([`Open`](SerialError::Open),
///   [`Disconnected`](SerialError::Disconnected)): close the port and
///   re-enter the reconnect loop
/// - line-level ([`Decode`](SerialError::Decode)): log, pause briefly, keep
///   reading on the same connection
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("failed to open {device}: {message}")]
    Open { device: String, message: String },

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("line decode failed: {0}")]
    Decode(String),
}

impl SerialError {
    /// Returns true if this fault requires closing and reopening the port.
    #[must_use]
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Disconnected(_))
    }
}

/// HTTP-server-specific errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("refusing to bind public address {addr} without allow_public_bind")]
    PublicBindRefused { addr: String },
}
