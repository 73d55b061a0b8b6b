//! Canonical device status and the cached per-device status record.

use crate::types::DeviceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Operational status of a device.
///
/// Every status has a stable numeric code, an upper-case name and a display
/// text. Conversions from external input never fail: anything unrecognized
/// becomes [`DeviceStatus::Unknown`].
///
/// # Examples
///
/// ```
/// use fleetlink_core::DeviceStatus;
///
/// assert_eq!(DeviceStatus::from_code(1), DeviceStatus::Online);
/// assert_eq!(DeviceStatus::from_label("fault"), DeviceStatus::Fault);
/// assert_eq!(DeviceStatus::from_label("3"), DeviceStatus::Fault);
/// assert_eq!(DeviceStatus::from_label("on fire"), DeviceStatus::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Online,
    Offline,
    Fault,
    Maintenance,
    Unknown,
}

impl DeviceStatus {
    /// All statuses, in code order.
    pub const ALL: [DeviceStatus; 5] = [
        Self::Online,
        Self::Offline,
        Self::Fault,
        Self::Maintenance,
        Self::Unknown,
    ];

    /// Stable numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Online => 1,
            Self::Offline => 2,
            Self::Fault => 3,
            Self::Maintenance => 4,
            Self::Unknown => 5,
        }
    }

    /// Upper-case name used on the wire (`"ONLINE"`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
            Self::Fault => "FAULT",
            Self::Maintenance => "MAINTENANCE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Display text for operators.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
            Self::Fault => "Fault",
            Self::Maintenance => "Under maintenance",
            Self::Unknown => "Unknown",
        }
    }

    /// Map a numeric code to a status; unknown codes map to `Unknown`.
    ///
    /// Accepts any width that widens to `i64`, so `from_code(s.code())`
    /// round-trips without a cast.
    #[must_use]
    pub fn from_code(code: impl Into<i64>) -> Self {
        match code.into() {
            1 => Self::Online,
            2 => Self::Offline,
            3 => Self::Fault,
            4 => Self::Maintenance,
            _ => Self::Unknown,
        }
    }

    /// Parse free text: a numeric code, a name (any case) or the display text.
    ///
    /// Blank or unrecognized input maps to `Unknown`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() {
            return Self::Unknown;
        }

        if let Ok(code) = label.parse::<i64>() {
            return Self::from_code(code);
        }

        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(label) || s.description() == label)
            .unwrap_or(Self::Unknown)
    }

    #[must_use]
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for DeviceStatus {
    fn from(label: &str) -> Self {
        Self::from_label(label)
    }
}

impl From<i32> for DeviceStatus {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<i64> for DeviceStatus {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

/// Cached status state of one device.
///
/// Owned by the status coordinator; business code only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatusRecord {
    pub device_id: DeviceId,
    pub status: DeviceStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub last_error_message: Option<String>,
    #[serde(default)]
    pub extended_attributes: HashMap<String, serde_json::Value>,
}

impl DeviceStatusRecord {
    /// Create a record observed now.
    pub fn new(device_id: DeviceId, status: DeviceStatus) -> Self {
        Self {
            device_id,
            status,
            last_heartbeat: Utc::now(),
            last_error_message: None,
            extended_attributes: HashMap::new(),
        }
    }

    /// Move the heartbeat to `at`, never backwards.
    pub fn touch_heartbeat(&mut self, at: DateTime<Utc>) {
        if at > self.last_heartbeat {
            self.last_heartbeat = at;
        }
    }

    /// Time elapsed since the last heartbeat, measured at `now`.
    #[must_use]
    pub fn heartbeat_age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_heartbeat
    }

    /// Attach an extension attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extended_attributes.insert(key.into(), value);
        self
    }
}
