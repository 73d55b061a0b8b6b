//! Inbound device messages and business domains.

use chrono::{DateTime, Utc};
use fleetlink_core::{DeviceId, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Business domain a message belongs to.
///
/// Domains are independent of the wire protocol: one domain may be served by
/// several vendors' adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessDomain {
    Access,
    Attendance,
    Consume,
}

impl BusinessDomain {
    pub const ALL: [BusinessDomain; 3] = [Self::Access, Self::Attendance, Self::Consume];

    /// Routing key for this domain.
    #[must_use]
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Access => "ACCESS",
            Self::Attendance => "ATTENDANCE",
            Self::Consume => "CONSUME",
        }
    }
}

impl fmt::Display for BusinessDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl AsRef<str> for BusinessDomain {
    fn as_ref(&self) -> &str {
        self.as_key()
    }
}

/// Message received from (or addressed to) a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub device_id: DeviceId,
    pub transport: Transport,
    /// Vendor-specific event or command name (e.g. `"card_swipe"`).
    pub message_type: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl DeviceMessage {
    pub fn new(
        device_id: impl Into<DeviceId>,
        message_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            transport: Transport::TcpPush,
            message_type: message_type.into(),
            payload,
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}
