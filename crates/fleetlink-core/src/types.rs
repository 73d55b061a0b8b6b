use crate::constants::GENERIC_MANUFACTURER;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque device identifier.
///
/// The layer never interprets the key; it is whatever the device-record store
/// uses to identify a device (`"CAM001"`, `"1024"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Family of physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    /// Door and turnstile access controllers.
    Access,
    /// Time attendance terminals.
    Attendance,
    /// Canteen and shop consumption terminals.
    Consume,
    /// Video cameras and recorders.
    Video,
}

impl DeviceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "ACCESS",
            Self::Attendance => "ATTENDANCE",
            Self::Consume => "CONSUME",
            Self::Video => "VIDEO",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport a device is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transport {
    TcpPush,
    Udp,
    Rs485,
    Http,
    VendorSdk,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TcpPush => "TCP_PUSH",
            Self::Udp => "UDP",
            Self::Rs485 => "RS485",
            Self::Http => "HTTP",
            Self::VendorSdk => "VENDOR_SDK",
        };
        f.write_str(name)
    }
}

/// A device as seen by protocol adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Record-store key.
    pub id: DeviceId,

    /// Human readable name.
    pub name: String,

    /// Device family.
    pub device_type: DeviceType,

    /// Manufacturer tag (e.g. "ZKTECO"); `None` selects generic adapters.
    pub manufacturer: Option<String>,

    /// Adapter tag the device is bound to (e.g. "ZKTECO", "RS485").
    pub protocol: String,

    /// Transport used to reach the device.
    pub transport: Transport,

    /// Network address or serial port.
    pub address: Option<String>,

    /// TCP/UDP port, if any.
    pub port: Option<u16>,
}

impl Device {
    /// Create a device with the required fields.
    pub fn new(
        id: impl Into<DeviceId>,
        device_type: DeviceType,
        protocol: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            device_type,
            manufacturer: None,
            protocol: protocol.into(),
            transport: Transport::TcpPush,
            address: None,
            port: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
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

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>, port: Option<u16>) -> Self {
        self.address = Some(address.into());
        self.port = port;
        self
    }

    /// Manufacturer used for adapter matching.
    ///
    /// Blank or missing manufacturers fall back to [`GENERIC_MANUFACTURER`].
    #[must_use]
    pub fn manufacturer_or_generic(&self) -> String {
        match self.manufacturer.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_ascii_uppercase(),
            _ => GENERIC_MANUFACTURER.to_string(),
        }
    }
}
