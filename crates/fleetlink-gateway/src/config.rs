//! Gateway configuration.
//!
//! One TOML file holds every section; each section deserializes into the
//! owning crate's config type and falls back to its defaults when omitted.
//!
//! ```toml
//! [pipeline.retry]
//! max_retries = 3
//! initial_backoff_ms = 200
//!
//! [status]
//! batch_chunk_size = 100
//!
//! [heartbeat]
//! timeout_secs = 300
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [[devices]]
//! id = "CAM001"
//! device_type = "VIDEO"
//! protocol = "HIKVISION"
//! manufacturer = "HIKVISION"
//! address = "10.0.4.21"
//! port = 8000
//! ```

use crate::error::ConfigError;
use fleetlink_core::{Device, DeviceId, DeviceType, Transport};
use fleetlink_pipeline::PipelineConfig;
use fleetlink_status::{HeartbeatConfig, StatusConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Top-level gateway settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub pipeline: PipelineConfig,
    pub status: StatusConfig,
    pub heartbeat: HeartbeatConfig,
    pub logging: LoggingConfig,
    pub devices: Vec<DeviceConfig>,
}

/// Log output settings. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"fleetlink_status=debug,info"`.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// One fleet device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub device_type: DeviceType,
    /// Adapter tag the device is bound to.
    pub protocol: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default = "default_transport")]
    pub transport: Transport,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_transport() -> Transport {
    Transport::TcpPush
}

impl DeviceConfig {
    pub fn new(id: impl Into<String>, device_type: DeviceType, protocol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            device_type,
            protocol: protocol.into(),
            manufacturer: None,
            transport: Transport::TcpPush,
            address: None,
            port: None,
        }
    }

    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn device_id(&self) -> DeviceId {
        DeviceId::from(self.id.as_str())
    }

    pub fn to_device(&self) -> Device {
        let mut device = Device::new(self.device_id(), self.device_type, self.protocol.clone())
            .with_transport(self.transport);
        if let Some(name) = &self.name {
            device = device.with_name(name.clone());
        }
        if let Some(manufacturer) = &self.manufacturer {
            device = device.with_manufacturer(manufacturer.clone());
        }
        if let Some(address) = &self.address {
            device = device.with_address(address.clone(), self.port);
        }
        device
    }
}

impl GatewayConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus one simulated device per built-in adapter.
    pub fn demo() -> Self {
        Self {
            devices: vec![
                DeviceConfig::new("ACC-01", DeviceType::Access, "ZKTECO").with_manufacturer("ZKTECO"),
                DeviceConfig::new("CAM001", DeviceType::Video, "HIKVISION")
                    .with_manufacturer("HIKVISION"),
                DeviceConfig::new("CAM002", DeviceType::Video, "DAHUA").with_manufacturer("DAHUA"),
                DeviceConfig::new("POS-01", DeviceType::Consume, "ENTROPY")
                    .with_manufacturer("ENTROPY"),
                DeviceConfig::new("ATT-01", DeviceType::Attendance, "RS485")
                    .with_transport(Transport::Rs485),
            ],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(ConfigError::Invalid("device id must not be blank".into()));
            }
            if device.protocol.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "device {} has no protocol",
                    device.id
                )));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate device id {}",
                    device.id
                )));
            }
        }

        if self.status.batch_chunk_size == 0 {
            return Err(ConfigError::Invalid("status.batch_chunk_size must be > 0".into()));
        }

        let multiplier = self.pipeline.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "pipeline.retry.backoff_multiplier must be >= 1.0, got {multiplier}"
            )));
        }

        Ok(())
    }

    pub fn device(&self, id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }
}
