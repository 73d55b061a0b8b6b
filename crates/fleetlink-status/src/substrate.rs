//! Store and cache collaborators.
//!
//! The coordinator talks to persistence and to the shared cache only through
//! these two traits. Both are object-safe so deployments can plug in a
//! database or a networked cache without touching the coordinator.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetlink_core::{DeviceId, DeviceStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Persisted device row.
///
/// `status` holds the numeric status code as text (`"1"` for online), the
/// representation the fleet database uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub status: String,
    /// Last heartbeat known when the row was written.
    pub last_online: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    pub fn new(device_id: DeviceId, status: DeviceStatus) -> Self {
        Self {
            device_id,
            status: status.code().to_string(),
            last_online: None,
        }
    }

    #[must_use]
    pub fn with_last_online(mut self, at: DateTime<Utc>) -> Self {
        self.last_online = Some(at);
        self
    }

    /// Decoded status; unreadable values map to `Unknown`.
    #[must_use]
    pub fn device_status(&self) -> DeviceStatus {
        DeviceStatus::from_label(&self.status)
    }
}

/// Authoritative device persistence.
#[async_trait]
pub trait DeviceRecordStore: Send + Sync {
    async fn load_by_key(&self, device_id: &DeviceId) -> Result<Option<DeviceRecord>>;

    /// Insert or replace the row for `record.device_id`.
    async fn save(&self, record: &DeviceRecord) -> Result<()>;

    /// Rows for the given ids; missing ids are skipped.
    async fn load_many(&self, device_ids: &[DeviceId]) -> Result<Vec<DeviceRecord>>;

    /// Save many rows. Defaults to sequential [`save`](Self::save) calls.
    async fn save_many(&self, records: &[DeviceRecord]) -> Result<()> {
        for record in records {
            self.save(record).await?;
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<DeviceRecord>>;
}

/// Shared cache with expiry and publish/subscribe.
#[async_trait]
pub trait CacheSubstrate: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Broadcast `message` on `channel`.
    async fn publish(&self, channel: &str, message: String) -> Result<()>;
}
