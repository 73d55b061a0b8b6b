//! Status change notifications.

use chrono::{DateTime, Utc};
use fleetlink_core::constants::{STATUS_CHANGE_EVENT_TYPE, STATUS_CHANGE_SOURCE};
use fleetlink_core::{DeviceId, DeviceStatus};
use serde::{Deserialize, Serialize};

/// An effective status transition, as seen by in-process listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub device_id: DeviceId,
    /// `None` when the device had no record before.
    pub old: Option<DeviceStatus>,
    pub new: DeviceStatus,
    pub error_message: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(device_id: DeviceId, old: Option<DeviceStatus>, new: DeviceStatus) -> Self {
        Self {
            device_id,
            old,
            new,
            error_message: None,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_error_message(mut self, message: Option<String>) -> Self {
        self.error_message = message;
        self
    }

    /// Wire form published on the change channel.
    pub fn to_event(&self) -> StatusChangeEvent {
        StatusChangeEvent {
            device_id: self.device_id.to_string(),
            old_status: self.old.map(|s| s.as_str().to_string()),
            old_status_code: self.old.map(DeviceStatus::code),
            old_status_desc: self.old.map(|s| s.description().to_string()),
            new_status: self.new.as_str().to_string(),
            new_status_code: self.new.code(),
            new_status_desc: self.new.description().to_string(),
            timestamp: self.at.timestamp_millis(),
            event_type: STATUS_CHANGE_EVENT_TYPE.to_string(),
            source: STATUS_CHANGE_SOURCE.to_string(),
        }
    }
}

/// JSON payload broadcast to external subscribers.
///
/// ```json
/// {"deviceId":"CAM001","oldStatus":null,"oldStatusCode":null,"oldStatusDesc":null,
///  "newStatus":"ONLINE","newStatusCode":1,"newStatusDesc":"Online",
///  "timestamp":1767225600000,"eventType":"DEVICE_STATUS_CHANGE","source":"DeviceStatusCoordinator"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeEvent {
    pub device_id: String,
    pub old_status: Option<String>,
    pub old_status_code: Option<i32>,
    pub old_status_desc: Option<String>,
    pub new_status: String,
    pub new_status_code: i32,
    pub new_status_desc: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub event_type: String,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_first_transition_has_null_old_fields() {
        let change = StatusChange::new(DeviceId::from("CAM001"), None, DeviceStatus::Online);
        let value: Value = serde_json::to_value(change.to_event()).unwrap();

        assert_eq!(value["deviceId"], "CAM001");
        assert_eq!(value["oldStatus"], Value::Null);
        assert_eq!(value["oldStatusCode"], Value::Null);
        assert_eq!(value["newStatus"], "ONLINE");
        assert_eq!(value["newStatusCode"], 1);
        assert_eq!(value["eventType"], "DEVICE_STATUS_CHANGE");
        assert_eq!(value["source"], "DeviceStatusCoordinator");
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn test_transition_fields() {
        let change = StatusChange::new(
            DeviceId::from("CAM001"),
            Some(DeviceStatus::Online),
            DeviceStatus::Fault,
        );
        let value = serde_json::to_value(change.to_event()).unwrap();

        assert_eq!(value["oldStatus"], json!("ONLINE"));
        assert_eq!(value["oldStatusCode"], json!(1));
        assert_eq!(value["newStatus"], json!("FAULT"));
        assert_eq!(value["newStatusCode"], json!(3));
        assert_eq!(value["newStatusDesc"], json!("Fault"));
    }
}
