//! Device status coordinator.
//!
//! Owns the authoritative online/offline/fault state of every device. Reads
//! go through the cache and fall back to the store; writes go to the store
//! first, then the cache, then listeners and the change channel.
//!
//! # Ordering
//!
//! Every mutation of one device runs under that device's async mutex, so
//! read-compare-persist-cache-notify-publish is atomic per device. Different
//! devices never wait on each other; batch updates take their locks in
//! sorted id order.
//!
//! # Degradation
//!
//! Store and cache failures are logged and never returned. A failed read
//! behaves like a miss; a failed store write aborts that device's update
//! without touching the cache or notifying anybody.

use crate::config::StatusConfig;
use crate::error::SubstrateError;
use crate::event::StatusChange;
use crate::listener::{DeviceStatusListener, ListenerSet};
use crate::substrate::{CacheSubstrate, DeviceRecord, DeviceRecordStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fleetlink_core::{DeviceId, DeviceStatus, DeviceStatusRecord, ProtocolError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Outcome of [`DeviceStatusCoordinator::batch_update_status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchUpdateReport {
    /// Distinct devices in the request.
    pub requested: usize,
    /// Devices whose status changed and was persisted.
    pub changed: usize,
    /// Devices already in the requested status.
    pub unchanged: usize,
    /// Changed devices that had no store row before.
    pub created: usize,
    /// Chunks attempted.
    pub chunks: usize,
    /// Whether a chunk failed and writes switched to one row at a time.
    pub fallback_used: bool,
    /// Devices whose write failed even one at a time.
    pub failed: Vec<DeviceId>,
}

impl BatchUpdateReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Coordinates device status across store, cache and subscribers.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fleetlink_core::{DeviceId, DeviceStatus};
/// use fleetlink_status::DeviceStatusCoordinator;
/// use fleetlink_status::memory::{InMemoryCache, InMemoryStore};
///
/// # #[tokio::main]
/// # async fn main() {
/// let coordinator = DeviceStatusCoordinator::new(
///     Arc::new(InMemoryStore::new()),
///     Arc::new(InMemoryCache::new()),
/// );
/// let id = DeviceId::from("ACC-01");
///
/// assert_eq!(coordinator.get_status(&id).await, DeviceStatus::Unknown);
/// assert!(coordinator.update_status(&id, DeviceStatus::Online).await);
/// assert!(!coordinator.update_status(&id, DeviceStatus::Online).await);
/// assert!(coordinator.is_online(&id).await);
/// # }
/// ```
pub struct DeviceStatusCoordinator {
    store: Arc<dyn DeviceRecordStore>,
    cache: Arc<dyn CacheSubstrate>,
    config: StatusConfig,
    locks: DashMap<DeviceId, Arc<Mutex<()>>>,
    listeners: ListenerSet,
}

impl DeviceStatusCoordinator {
    pub fn new(store: Arc<dyn DeviceRecordStore>, cache: Arc<dyn CacheSubstrate>) -> Self {
        Self::with_config(store, cache, StatusConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn DeviceRecordStore>,
        cache: Arc<dyn CacheSubstrate>,
        config: StatusConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            locks: DashMap::new(),
            listeners: ListenerSet::default(),
        }
    }

    pub fn config(&self) -> &StatusConfig {
        &self.config
    }

    // ---- reads -------------------------------------------------------------

    /// Current status; `Unknown` when the device has no record.
    ///
    /// A store hit is cached; an absent device is not.
    pub async fn get_status(&self, device_id: &DeviceId) -> DeviceStatus {
        self.load_record(device_id)
            .await
            .map_or(DeviceStatus::Unknown, |record| record.status)
    }

    pub async fn get_statuses(&self, device_ids: &[DeviceId]) -> BTreeMap<DeviceId, DeviceStatus> {
        let mut statuses = BTreeMap::new();
        for id in device_ids {
            statuses.insert(id.clone(), self.get_status(id).await);
        }
        statuses
    }

    pub async fn is_online(&self, device_id: &DeviceId) -> bool {
        self.get_status(device_id).await.is_online()
    }

    /// Full status record, including heartbeat and last error.
    pub async fn status_record(&self, device_id: &DeviceId) -> Option<DeviceStatusRecord> {
        self.load_record(device_id).await
    }

    /// Records of every device in the store, sorted by id.
    pub async fn all_records(&self) -> Vec<DeviceStatusRecord> {
        let rows = match self.store.load_all().await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Failed to list devices");
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = match self.read_cache(&row.device_id).await {
                Some(record) => record,
                None => {
                    let record = record_from_row(row);
                    self.write_cache(&record).await;
                    record
                }
            };
            records.push(record);
        }
        records
    }

    /// Ids of devices currently online.
    pub async fn online_devices(&self) -> Vec<DeviceId> {
        self.all_records()
            .await
            .into_iter()
            .filter(|record| record.status.is_online())
            .map(|record| record.device_id)
            .collect()
    }

    // ---- writes ------------------------------------------------------------

    /// Move a device to `status`.
    ///
    /// Returns `true` when the status changed; equal status is a no-op with
    /// no event.
    pub async fn update_status(&self, device_id: &DeviceId, status: DeviceStatus) -> bool {
        let _guard = self.lock_device(device_id).await;
        self.transition(device_id, status, None).await
    }

    /// Record a heartbeat. Ignored for devices without a record.
    pub async fn update_heartbeat(&self, device_id: &DeviceId) -> bool {
        let _guard = self.lock_device(device_id).await;
        self.touch(device_id).await
    }

    /// Record an error and force the device to `Fault`.
    ///
    /// Creates the record for unknown devices. A device already in `Fault`
    /// only gets its message updated, without an event. Returns whether the
    /// status changed.
    pub async fn set_error(&self, device_id: &DeviceId, message: impl Into<String>) -> bool {
        let message = message.into();
        let _guard = self.lock_device(device_id).await;
        self.transition(device_id, DeviceStatus::Fault, Some(message))
            .await
    }

    /// Fold the outcome of a device call into the device's status.
    ///
    /// Success marks the device online and records a heartbeat. Failures use
    /// [`ErrorKind::status_hint`](fleetlink_core::ErrorKind::status_hint):
    /// unreachable devices go offline, faulting ones go to fault with the
    /// error text. Other failures leave the status alone. Returns the status
    /// in effect afterwards, or `None` when nothing was applied (including a
    /// failed store write).
    pub async fn apply_outcome<T>(
        &self,
        device_id: &DeviceId,
        outcome: &std::result::Result<T, ProtocolError>,
    ) -> Option<DeviceStatus> {
        let _guard = self.lock_device(device_id).await;

        match outcome {
            Ok(_) => self.settle(device_id, DeviceStatus::Online, None).await,
            Err(e) => match e.kind.status_hint() {
                Some(DeviceStatus::Fault) => {
                    self.settle(device_id, DeviceStatus::Fault, Some(e.to_string()))
                        .await
                }
                Some(status) => self.settle(device_id, status, None).await,
                None => {
                    debug!(device_id = %device_id, kind = %e.kind, "Outcome does not affect status");
                    None
                }
            },
        }
    }

    /// Mark an online device offline if its heartbeat is older than `timeout` at `now`.
    ///
    /// The check runs under the device lock, so a heartbeat arriving
    /// concurrently is never overridden.
    pub async fn expire_if_stale(
        &self,
        device_id: &DeviceId,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let _guard = self.lock_device(device_id).await;

        let Some(record) = self.load_record(device_id).await else {
            return false;
        };
        if !record.status.is_online() {
            return false;
        }

        let limit = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let age = record.heartbeat_age(now);
        if age <= limit {
            return false;
        }

        info!(
            device_id = %device_id,
            silent_secs = age.num_seconds(),
            "Heartbeat timeout, marking device offline"
        );
        self.transition(device_id, DeviceStatus::Offline, None).await
    }

    /// Update many devices at once.
    ///
    /// Locks are taken in sorted id order. Changed entries are grouped by
    /// target status and written in chunks of `batch_chunk_size`; when a chunk
    /// fails, that chunk and every later one are written one row at a time.
    /// The cache is refreshed for every entry that was not lost, and one
    /// change is announced per effective transition.
    pub async fn batch_update_status<I>(&self, updates: I) -> BatchUpdateReport
    where
        I: IntoIterator<Item = (DeviceId, DeviceStatus)>,
    {
        let updates: BTreeMap<DeviceId, DeviceStatus> = updates.into_iter().collect();
        let mut report = BatchUpdateReport {
            requested: updates.len(),
            ..Default::default()
        };
        if updates.is_empty() {
            return report;
        }
        info!(count = updates.len(), "Batch status update");

        let mut guards = Vec::with_capacity(updates.len());
        for id in updates.keys() {
            guards.push(self.lock_device(id).await);
        }

        let now = Utc::now();
        let mut unchanged = Vec::new();
        let mut pending: Vec<(DeviceStatusRecord, Option<DeviceStatus>)> = Vec::new();
        for (id, &status) in &updates {
            let current = self.load_record(id).await;
            let old = current.as_ref().map(|record| record.status);
            match current {
                Some(record) if old == Some(status) => unchanged.push(record),
                current => {
                    let mut record =
                        current.unwrap_or_else(|| DeviceStatusRecord::new(id.clone(), status));
                    apply_status(&mut record, status, None, now);
                    pending.push((record, old));
                }
            }
        }
        report.unchanged = unchanged.len();

        let mut groups: BTreeMap<DeviceStatus, Vec<usize>> = BTreeMap::new();
        for (index, (record, _)) in pending.iter().enumerate() {
            groups.entry(record.status).or_default().push(index);
        }

        let chunk_size = self.config.batch_chunk_size.max(1);
        let mut persisted = vec![false; pending.len()];
        for (status, indices) in &groups {
            for chunk in indices.chunks(chunk_size) {
                report.chunks += 1;

                if !report.fallback_used {
                    let rows: Vec<DeviceRecord> =
                        chunk.iter().map(|&i| row_from_record(&pending[i].0)).collect();
                    match self.write_chunk(&rows).await {
                        Ok(created) => {
                            report.created += created;
                            for &i in chunk {
                                persisted[i] = true;
                            }
                            debug!(status = %status, size = chunk.len(), "Chunk written");
                            continue;
                        }
                        Err(e) => {
                            warn!(
                                status = %status,
                                size = chunk.len(),
                                error = %e,
                                "Batch write failed, falling back to single writes"
                            );
                            report.fallback_used = true;
                        }
                    }
                }

                for &i in chunk {
                    persisted[i] = self.persist(&pending[i].0).await;
                }
            }
        }

        for record in &unchanged {
            self.write_cache(record).await;
        }

        for ((record, old), saved) in pending.into_iter().zip(persisted) {
            if !saved {
                report.failed.push(record.device_id);
                continue;
            }
            self.write_cache(&record).await;
            report.changed += 1;
            self.announce(StatusChange::new(record.device_id.clone(), old, record.status))
                .await;
        }

        drop(guards);

        if report.is_complete() {
            info!(
                requested = report.requested,
                changed = report.changed,
                unchanged = report.unchanged,
                "Batch status update complete"
            );
        } else {
            error!(
                requested = report.requested,
                changed = report.changed,
                failed = report.failed.len(),
                "Batch status update incomplete"
            );
        }
        report
    }

    /// Drop the cached record so the next read goes to the store.
    pub async fn invalidate(&self, device_id: &DeviceId) {
        let key = self.config.cache_key(device_id.as_str());
        if let Err(e) = self.cache.delete(&key).await {
            error!(device_id = %device_id, error = %e, "Failed to invalidate cached status");
        }
    }

    // ---- listeners ---------------------------------------------------------

    /// Register a listener; a listener with the same name is replaced in place.
    pub fn register_listener(&self, listener: Arc<dyn DeviceStatusListener>) {
        self.listeners.register(listener);
    }

    pub fn unregister_listener(&self, name: &str) -> bool {
        self.listeners.unregister(name)
    }

    /// Listener names in notification order.
    pub fn listener_names(&self) -> Vec<String> {
        self.listeners.names()
    }

    // ---- internals ---------------------------------------------------------

    /// Take the device's mutex. The table entry is dropped again once no
    /// caller holds or waits for it.
    async fn lock_device(&self, device_id: &DeviceId) -> DeviceGuard<'_> {
        let lock = Arc::clone(self.locks.entry(device_id.clone()).or_default().value());
        DeviceGuard {
            locks: &self.locks,
            device_id: device_id.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Devices with a live entry in the lock table.
    #[cfg(test)]
    fn lock_table_len(&self) -> usize {
        self.locks.len()
    }

    /// Apply `status` and persist, cache and announce it. Caller holds the device lock.
    async fn transition(
        &self,
        device_id: &DeviceId,
        status: DeviceStatus,
        error_message: Option<String>,
    ) -> bool {
        let current = self.load_record(device_id).await;
        let old = current.as_ref().map(|record| record.status);
        let changed = old != Some(status);

        if !changed && error_message.is_none() {
            debug!(device_id = %device_id, status = %status, "Status unchanged");
            return false;
        }

        let mut record =
            current.unwrap_or_else(|| DeviceStatusRecord::new(device_id.clone(), status));
        apply_status(&mut record, status, error_message, Utc::now());

        if changed && !self.persist(&record).await {
            return false;
        }
        self.write_cache(&record).await;

        if !changed {
            debug!(device_id = %device_id, "Fault message updated");
            return false;
        }

        let change = StatusChange::new(device_id.clone(), old, status)
            .with_error_message(record.last_error_message.clone());
        self.announce(change).await;
        true
    }

    /// Move to `status` and report it when it is in effect afterwards. Caller
    /// holds the device lock.
    async fn settle(
        &self,
        device_id: &DeviceId,
        status: DeviceStatus,
        error_message: Option<String>,
    ) -> Option<DeviceStatus> {
        if self.transition(device_id, status, error_message).await {
            return Some(status);
        }

        let current = self.load_record(device_id).await.map(|record| record.status);
        if current != Some(status) {
            warn!(device_id = %device_id, status = %status, "Outcome not applied");
            return None;
        }
        if status.is_online() {
            self.touch(device_id).await;
        }
        Some(status)
    }

    /// Refresh the heartbeat of an existing record. Caller holds the device lock.
    async fn touch(&self, device_id: &DeviceId) -> bool {
        let Some(mut record) = self.load_record(device_id).await else {
            debug!(device_id = %device_id, "Heartbeat for unknown device ignored");
            return false;
        };
        record.touch_heartbeat(Utc::now());
        self.write_cache(&record).await;
        true
    }

    /// Cache first, then store. Store hits are cached.
    async fn load_record(&self, device_id: &DeviceId) -> Option<DeviceStatusRecord> {
        if let Some(record) = self.read_cache(device_id).await {
            return Some(record);
        }

        match self.store.load_by_key(device_id).await {
            Ok(Some(row)) => {
                let record = record_from_row(row);
                self.write_cache(&record).await;
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                error!(device_id = %device_id, error = %e, "Failed to load device status");
                None
            }
        }
    }

    async fn read_cache(&self, device_id: &DeviceId) -> Option<DeviceStatusRecord> {
        let key = self.config.cache_key(device_id.as_str());
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(device_id = %device_id, error = %e, "Discarding unreadable cached status");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!(device_id = %device_id, error = %e, "Failed to read cached status");
                None
            }
        }
    }

    async fn write_cache(&self, record: &DeviceStatusRecord) {
        let key = self.config.cache_key(record.device_id.as_str());
        let result = match serde_json::to_string(record) {
            Ok(raw) => self.cache.set_with_ttl(&key, raw, self.config.cache_ttl()).await,
            Err(e) => Err(SubstrateError::from(e)),
        };
        if let Err(e) = result {
            error!(device_id = %record.device_id, error = %e, "Failed to cache device status");
        }
    }

    async fn persist(&self, record: &DeviceStatusRecord) -> bool {
        match self.store.save(&row_from_record(record)).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    device_id = %record.device_id,
                    status = %record.status,
                    error = %e,
                    "Failed to persist device status"
                );
                false
            }
        }
    }

    /// Write one chunk, returning how many rows did not exist before.
    async fn write_chunk(&self, rows: &[DeviceRecord]) -> Result<usize, SubstrateError> {
        let ids: Vec<DeviceId> = rows.iter().map(|row| row.device_id.clone()).collect();
        let existing: HashSet<DeviceId> = self
            .store
            .load_many(&ids)
            .await?
            .into_iter()
            .map(|row| row.device_id)
            .collect();

        self.store.save_many(rows).await?;
        Ok(ids.iter().filter(|id| !existing.contains(*id)).count())
    }

    async fn announce(&self, change: StatusChange) {
        info!(
            device_id = %change.device_id,
            old = %change.old.map_or("NONE", DeviceStatus::as_str),
            new = %change.new,
            "Device status changed"
        );

        self.listeners.notify(&change);

        let published = match serde_json::to_string(&change.to_event()) {
            Ok(payload) => self.cache.publish(&self.config.change_channel, payload).await,
            Err(e) => Err(SubstrateError::from(e)),
        };
        if let Err(e) = published {
            error!(
                device_id = %change.device_id,
                new = %change.new,
                error = %e,
                "Failed to publish status change"
            );
        }
    }
}

/// Held device mutex; prunes the lock table entry on release.
struct DeviceGuard<'a> {
    locks: &'a DashMap<DeviceId, Arc<Mutex<()>>>,
    device_id: DeviceId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DeviceGuard<'_> {
    fn drop(&mut self) {
        // Release first: the entry is only removable while the table holds
        // the sole reference, and new references are taken under the shard lock.
        self.guard.take();
        self.locks
            .remove_if(&self.device_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Set `status` on `record`, with the side effects each status implies.
fn apply_status(
    record: &mut DeviceStatusRecord,
    status: DeviceStatus,
    error_message: Option<String>,
    now: DateTime<Utc>,
) {
    record.status = status;
    match status {
        DeviceStatus::Online => {
            record.touch_heartbeat(now);
            record.last_error_message = None;
        }
        DeviceStatus::Fault if error_message.is_some() => {
            record.last_error_message = error_message;
        }
        _ => {}
    }
}

fn record_from_row(row: DeviceRecord) -> DeviceStatusRecord {
    let status = row.device_status();
    let mut record = DeviceStatusRecord::new(row.device_id, status);
    if let Some(at) = row.last_online {
        record.last_heartbeat = at;
    }
    record
}

fn row_from_record(record: &DeviceStatusRecord) -> DeviceRecord {
    DeviceRecord::new(record.device_id.clone(), record.status).with_last_online(record.last_heartbeat)
}
