//! Self-describing adapter metadata.
//!
//! A descriptor tells operators and discovery tooling what an adapter can do.
//! The dispatch path never branches on it.

use chrono::{DateTime, Utc};
use fleetlink_core::{DeviceType, Transport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Feature flags advertised by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub person_dispatch: bool,
    pub biometric_dispatch: bool,
    pub config_dispatch: bool,
    pub batch_dispatch: bool,
    pub remote_deletion: bool,
    pub realtime_events: bool,
    /// Largest batch accepted in one call.
    pub max_batch_size: usize,
}

impl Default for AdapterCapabilities {
    fn default() -> Self {
        Self {
            person_dispatch: true,
            biometric_dispatch: false,
            config_dispatch: true,
            batch_dispatch: false,
            remote_deletion: true,
            realtime_events: false,
            max_batch_size: 1,
        }
    }
}

/// What the adapter needs from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalRequirements {
    pub transport: Transport,
    pub default_port: Option<u16>,
    pub requires_authentication: bool,
    pub min_firmware_version: Option<String>,
}

impl Default for TechnicalRequirements {
    fn default() -> Self {
        Self {
            transport: Transport::TcpPush,
            default_port: None,
            requires_authentication: false,
            min_firmware_version: None,
        }
    }
}

/// Expected performance envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    pub typical_latency_ms: u64,
    pub max_concurrent_connections: usize,
    pub max_operations_per_second: u32,
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        Self {
            typical_latency_ms: 100,
            max_concurrent_connections: 16,
            max_operations_per_second: 50,
        }
    }
}

/// Adapter capability descriptor.
///
/// # Examples
///
/// ```
/// use fleetlink_adapter::AdapterDescriptor;
/// use fleetlink_core::DeviceType;
///
/// let mut descriptor = AdapterDescriptor::new("ZKTeco Push", "1.0.0", DeviceType::Access)
///     .with_manufacturer("ZKTECO")
///     .with_protocol("PUSH-V3")
///     .with_feature("remote-open");
///
/// descriptor.add_limitation("no face templates above 64KB");
/// assert!(descriptor.supports_feature("remote-open"));
/// assert_eq!(descriptor.limitations.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub name: String,
    pub version: String,
    pub supported_device_type: DeviceType,
    pub supported_manufacturers: BTreeSet<String>,
    pub supported_protocols: BTreeSet<String>,
    pub supported_features: BTreeSet<String>,
    pub capabilities: AdapterCapabilities,
    pub technical: TechnicalRequirements,
    pub performance: PerformanceProfile,
    pub limitations: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl AdapterDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            supported_device_type: device_type,
            supported_manufacturers: BTreeSet::new(),
            supported_protocols: BTreeSet::new(),
            supported_features: BTreeSet::new(),
            capabilities: AdapterCapabilities::default(),
            technical: TechnicalRequirements::default(),
            performance: PerformanceProfile::default(),
            limitations: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Manufacturer tags are stored upper-cased.
    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl AsRef<str>) -> Self {
        self.supported_manufacturers
            .insert(manufacturer.as_ref().trim().to_ascii_uppercase());
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.supported_protocols.insert(protocol.into());
        self
    }

    #[must_use]
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.supported_features.insert(feature.into());
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: AdapterCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_technical(mut self, technical: TechnicalRequirements) -> Self {
        self.technical = technical;
        self
    }

    #[must_use]
    pub fn with_performance(mut self, performance: PerformanceProfile) -> Self {
        self.performance = performance;
        self
    }

    /// Record a known limitation.
    pub fn add_limitation(&mut self, limitation: impl Into<String>) {
        self.limitations.push(limitation.into());
        self.last_updated = Utc::now();
    }

    /// Advertise an extra feature after construction.
    pub fn add_feature(&mut self, feature: impl Into<String>) {
        self.supported_features.insert(feature.into());
        self.last_updated = Utc::now();
    }

    #[must_use]
    pub fn supports_manufacturer(&self, manufacturer: &str) -> bool {
        self.supported_manufacturers
            .contains(&manufacturer.trim().to_ascii_uppercase())
    }

    #[must_use]
    pub fn supports_protocol(&self, protocol: &str) -> bool {
        self.supported_protocols.contains(protocol)
    }

    #[must_use]
    pub fn supports_feature(&self, feature: &str) -> bool {
        self.supported_features.contains(feature)
    }

    /// One-line summary for listings.
    #[must_use]
    pub fn summary(&self) -> String {
        let manufacturers: Vec<&str> = self
            .supported_manufacturers
            .iter()
            .map(String::as_str)
            .collect();
        format!(
            "{} v{} [{}] manufacturers={} transport={}",
            self.name,
            self.version,
            self.supported_device_type,
            manufacturers.join(","),
            self.technical.transport
        )
    }
}
