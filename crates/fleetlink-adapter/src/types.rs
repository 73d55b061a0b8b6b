//! Payloads sent to adapters and the results they return.

use chrono::{DateTime, Utc};
use fleetlink_core::DeviceStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Person data pushed to a device (access rights, card, validity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Person identifier shared with the business layer.
    pub person_id: String,

    /// Display name.
    pub name: String,

    /// Card or badge number, if the person uses one.
    pub card_number: Option<String>,

    /// Start of the validity window.
    pub valid_from: Option<DateTime<Utc>>,

    /// End of the validity window.
    pub valid_until: Option<DateTime<Utc>>,

    /// Vendor-specific extras passed through untouched.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PersonRecord {
    pub fn new(person_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            name: name.into(),
            card_number: None,
            valid_from: None,
            valid_until: None,
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_card(mut self, card_number: impl Into<String>) -> Self {
        self.card_number = Some(card_number.into());
        self
    }

    #[must_use]
    pub fn with_validity(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.valid_from = Some(from);
        self.valid_until = Some(until);
        self
    }
}

/// Kind of biometric template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiometricKind {
    Fingerprint,
    Face,
    Iris,
    Palm,
}

/// Biometric template pushed to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricTemplate {
    pub person_id: String,
    pub kind: BiometricKind,
    /// Raw vendor template bytes.
    pub template: Vec<u8>,
    /// Capture quality (0-100), when known.
    pub quality: Option<u8>,
}

impl BiometricTemplate {
    pub fn new(person_id: impl Into<String>, kind: BiometricKind, template: Vec<u8>) -> Self {
        Self {
            person_id: person_id.into(),
            kind,
            template,
            quality: None,
        }
    }
}

/// Configuration entries pushed to a device.
///
/// Device configuration is vendor-defined, so entries stay as JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPayload {
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl ConfigPayload {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.entries.insert(key.into(), value);
        self
    }
}

/// Outcome of a connection test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub reachable: bool,
    pub latency: Duration,
    pub message: String,
    pub tested_at: DateTime<Utc>,
}

impl ConnectionTestResult {
    pub fn reachable(latency: Duration) -> Self {
        Self {
            reachable: true,
            latency,
            message: "Connection established".to_string(),
            tested_at: Utc::now(),
        }
    }

    /// One-line summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.reachable {
            format!("reachable in {}ms", self.latency.as_millis())
        } else {
            format!("unreachable: {}", self.message)
        }
    }
}

/// Failure of one item inside a batch dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub reason: String,
}

/// Aggregate outcome of a dispatch call.
///
/// For single-item dispatches `total` is 1. Batch dispatches report failed
/// items here instead of raising an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
    pub message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl DispatchResult {
    /// All `count` items were applied.
    pub fn ok(count: usize) -> Self {
        Self {
            total: count,
            succeeded: count,
            failures: Vec::new(),
            message: None,
            completed_at: Utc::now(),
        }
    }

    /// Build a batch result from per-item failures.
    pub fn from_failures(total: usize, failures: Vec<ItemFailure>) -> Self {
        Self {
            total,
            succeeded: total.saturating_sub(failures.len()),
            failures,
            message: None,
            completed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.succeeded == self.total
    }
}

/// Structured status reported by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatusReport {
    pub status: DeviceStatus,
    pub firmware_version: Option<String>,
    pub person_count: Option<usize>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub reported_at: DateTime<Utc>,
}

impl DeviceStatusReport {
    pub fn new(status: DeviceStatus) -> Self {
        Self {
            status,
            firmware_version: None,
            person_count: None,
            attributes: BTreeMap::new(),
            reported_at: Utc::now(),
        }
    }
}
