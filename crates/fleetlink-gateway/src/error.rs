use fleetlink_core::{DeviceId, ProtocolError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to load or validate the gateway configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type mismatch
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Gateway operation errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Device id not present in the configured fleet
    #[error("Device not configured: {0}")]
    UnknownDevice(DeviceId),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Specialized result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
