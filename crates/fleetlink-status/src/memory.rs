//! In-memory store and cache.
//!
//! Used by the gateway's simulated deployment and by tests. Both support
//! failure injection so degraded paths can be exercised.

use crate::error::{Result, SubstrateError};
use crate::substrate::{CacheSubstrate, DeviceRecord, DeviceRecordStore};
use async_trait::async_trait;
use dashmap::DashMap;
use fleetlink_core::DeviceId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

const CHANNEL_CAPACITY: usize = 256;

/// Published messages kept for [`InMemoryCache::published`].
const PUBLISH_LOG_CAPACITY: usize = 1024;

/// Device store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: DashMap<DeviceId, DeviceRecord>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_batch_writes: AtomicBool,
    save_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing failure injection.
    pub fn insert(&self, record: DeviceRecord) {
        self.rows.insert(record.device_id.clone(), record);
    }

    pub fn row(&self, device_id: &DeviceId) -> Option<DeviceRecord> {
        self.rows.get(device_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail every write, single and batch.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail only `save_many`.
    pub fn fail_batch_writes(&self, fail: bool) {
        self.fail_batch_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `save` calls, including those made by the default `save_many`.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SubstrateError::store("read failed (injected)"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SubstrateError::store("write failed (injected)"));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceRecordStore for InMemoryStore {
    async fn load_by_key(&self, device_id: &DeviceId) -> Result<Option<DeviceRecord>> {
        self.check_read()?;
        Ok(self.row(device_id))
    }

    async fn save(&self, record: &DeviceRecord) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write()?;
        self.insert(record.clone());
        Ok(())
    }

    async fn load_many(&self, device_ids: &[DeviceId]) -> Result<Vec<DeviceRecord>> {
        self.check_read()?;
        Ok(device_ids.iter().filter_map(|id| self.row(id)).collect())
    }

    async fn save_many(&self, records: &[DeviceRecord]) -> Result<()> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write()?;
        if self.fail_batch_writes.load(Ordering::SeqCst) {
            return Err(SubstrateError::store("batch write failed (injected)"));
        }
        for record in records {
            self.insert(record.clone());
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<DeviceRecord>> {
        self.check_read()?;
        let mut rows: Vec<_> = self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(rows)
    }
}

/// Cache with per-key expiry and broadcast channels.
///
/// Expiry uses the tokio clock, so paused-time tests can step over TTLs.
/// The publish log keeps the most recent messages only.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: DashMap<String, (String, Instant)>,
    channels: DashMap<String, broadcast::Sender<String>>,
    published: Mutex<VecDeque<(String, String)>>,
    publish_log_capacity: usize,
    fail_all: AtomicBool,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_publish_log_capacity(PUBLISH_LOG_CAPACITY)
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache whose publish log holds at most `capacity` messages.
    pub fn with_publish_log_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            channels: DashMap::new(),
            published: Mutex::new(VecDeque::new()),
            publish_log_capacity: capacity.max(1),
            fail_all: AtomicBool::new(false),
        }
    }

    /// Receive every message later published on `channel`.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Retained messages published on `channel`, oldest first.
    pub fn published(&self, channel: &str) -> Vec<String> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Whether `key` holds an unexpired value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.value().1 > Instant::now())
    }

    /// Fail every operation.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(SubstrateError::cache("cache unavailable (injected)"));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheSubstrate for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .and_then(|entry| (entry.value().1 > now).then(|| entry.value().0.clone()));
        if hit.is_none() {
            self.entries.remove_if(key, |_, (_, expires)| *expires <= now);
        }
        Ok(hit)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.check()?;
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }

    async fn publish(&self, channel: &str, message: String) -> Result<()> {
        self.check()?;
        if let Some(sender) = self.channels.get(channel) {
            // No live subscribers is fine.
            let _ = sender.send(message.clone());
        }
        let mut log = self
            .published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if log.len() >= self.publish_log_capacity {
            log.pop_front();
        }
        log.push_back((channel.to_string(), message));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlink_core::DeviceStatus;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = InMemoryCache::new();
        cache
            .set_with_ttl("k", "v".into(), Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.contains("k"));
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let cache = InMemoryCache::new();
        let mut rx = cache.subscribe("events");

        cache.publish("events", "hello".into()).await.unwrap();
        cache.publish("other", "ignored".into()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "hello");
        assert_eq!(cache.published("events"), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_publish_log_keeps_latest() {
        let cache = InMemoryCache::with_publish_log_capacity(3);
        let mut rx = cache.subscribe("events");

        for n in 0..5 {
            cache.publish("events", format!("m{n}")).await.unwrap();
        }

        assert_eq!(cache.published("events"), vec!["m2", "m3", "m4"]);
        // Subscribers still see everything.
        assert_eq!(rx.recv().await.unwrap(), "m0");
    }

    #[tokio::test]
    async fn test_cache_failure_injection() {
        let cache = InMemoryCache::new();
        cache.fail_all(true);
        assert!(matches!(cache.get("k").await, Err(SubstrateError::Cache(_))));
    }

    #[tokio::test]
    async fn test_store_upserts() {
        let store = InMemoryStore::new();
        let id = DeviceId::from("D1");
        store
            .save(&DeviceRecord::new(id.clone(), DeviceStatus::Online))
            .await
            .unwrap();
        store
            .save(&DeviceRecord::new(id.clone(), DeviceStatus::Fault))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.load_by_key(&id).await.unwrap().unwrap().device_status(),
            DeviceStatus::Fault
        );
    }

    #[tokio::test]
    async fn test_store_batch_failure_injection() {
        let store = InMemoryStore::new();
        store.fail_batch_writes(true);

        let rows = vec![DeviceRecord::new(DeviceId::from("D1"), DeviceStatus::Online)];
        assert!(store.save_many(&rows).await.is_err());
        assert!(store.save(&rows[0]).await.is_ok());
        assert_eq!(store.batch_calls(), 1);
        assert_eq!(store.save_calls(), 1);
    }
}
