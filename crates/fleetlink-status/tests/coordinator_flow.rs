//! Coordinator behaviour against the in-memory store and cache.

use fleetlink_core::{DeviceId, DeviceStatus};
use fleetlink_status::{
    DeviceRecord, DeviceStatusCoordinator, DeviceStatusListener, InMemoryCache, InMemoryStore,
    StatusChange, StatusChangeEvent, StatusConfig,
};
use rstest::rstest;
use std::sync::{Arc, Mutex};

const CHANNEL: &str = "fleetlink:device:status:change";

#[derive(Default)]
struct Collector {
    changes: Mutex<Vec<StatusChange>>,
}

impl Collector {
    fn changes(&self) -> Vec<StatusChange> {
        self.changes.lock().unwrap().clone()
    }
}

impl DeviceStatusListener for Collector {
    fn name(&self) -> &str {
        "collector"
    }

    fn on_status_changed(&self, change: &StatusChange) -> anyhow::Result<()> {
        self.changes.lock().unwrap().push(change.clone());
        Ok(())
    }
}

struct Failing;

impl DeviceStatusListener for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn on_status_changed(&self, _change: &StatusChange) -> anyhow::Result<()> {
        anyhow::bail!("downstream unavailable")
    }
}

struct Fixture {
    coordinator: Arc<DeviceStatusCoordinator>,
    store: Arc<InMemoryStore>,
    cache: Arc<InMemoryCache>,
    collector: Arc<Collector>,
}

fn fixture_with(config: StatusConfig) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let coordinator = Arc::new(DeviceStatusCoordinator::with_config(
        store.clone(),
        cache.clone(),
        config,
    ));
    let collector = Arc::new(Collector::default());
    coordinator.register_listener(collector.clone());
    Fixture {
        coordinator,
        store,
        cache,
        collector,
    }
}

fn fixture() -> Fixture {
    fixture_with(StatusConfig::default())
}

fn events(cache: &InMemoryCache) -> Vec<StatusChangeEvent> {
    cache
        .published(CHANNEL)
        .iter()
        .map(|raw| serde_json::from_str(raw).unwrap())
        .collect()
}

#[tokio::test]
async fn test_camera_lifecycle() {
    let f = fixture();
    let cam = DeviceId::from("CAM001");

    // Heartbeat before the device is known does nothing.
    assert!(!f.coordinator.update_heartbeat(&cam).await);
    assert_eq!(f.coordinator.get_status(&cam).await, DeviceStatus::Unknown);

    assert!(f.coordinator.update_status(&cam, DeviceStatus::Online).await);
    assert!(f.coordinator.update_heartbeat(&cam).await);

    assert!(f.coordinator.set_error(&cam, "sensor fault").await);
    assert_eq!(f.coordinator.get_status(&cam).await, DeviceStatus::Fault);
    assert!(!f.coordinator.is_online(&cam).await);

    let published = events(&f.cache);
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].old_status, None);
    assert_eq!(published[0].new_status, "ONLINE");
    assert_eq!(published[1].old_status.as_deref(), Some("ONLINE"));
    assert_eq!(published[1].new_status, "FAULT");
    assert_eq!(published[1].new_status_code, 3);

    let changes = f.collector.changes();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[1].error_message.as_deref(), Some("sensor fault"));

    let record = f.coordinator.status_record(&cam).await.unwrap();
    assert_eq!(record.last_error_message.as_deref(), Some("sensor fault"));
    assert_eq!(f.store.row(&cam).unwrap().status, "3");
}

#[tokio::test]
async fn test_repeated_update_emits_one_event() {
    let f = fixture();
    let id = DeviceId::from("ACC-7");

    for _ in 0..5 {
        f.coordinator.update_status(&id, DeviceStatus::Offline).await;
    }

    assert_eq!(f.collector.changes().len(), 1);
    assert_eq!(events(&f.cache).len(), 1);
}

#[tokio::test]
async fn test_concurrent_updates_on_one_device_are_serialized() {
    let f = fixture();
    let id = DeviceId::from("D1");

    let mut tasks = Vec::new();
    for i in 0..32 {
        let coordinator = f.coordinator.clone();
        let id = id.clone();
        let status = if i % 2 == 0 {
            DeviceStatus::Online
        } else {
            DeviceStatus::Offline
        };
        tasks.push(tokio::spawn(async move {
            coordinator.update_status(&id, status).await
        }));
    }
    let mut changed = 0;
    for task in tasks {
        if task.await.unwrap() {
            changed += 1;
        }
    }

    // Each reported change produced exactly one event, and consecutive
    // events chain old -> new without gaps.
    let changes = f.collector.changes();
    assert_eq!(changes.len(), changed);
    for pair in changes.windows(2) {
        assert_eq!(pair[1].old, Some(pair[0].new));
    }
    let last = changes.last().unwrap().new;
    assert_eq!(f.coordinator.get_status(&id).await, last);
}

#[tokio::test]
async fn test_batch_groups_and_chunks() {
    let f = fixture();
    let statuses = [DeviceStatus::Online, DeviceStatus::Offline, DeviceStatus::Fault];
    let updates: Vec<_> = (0..250)
        .map(|i| (DeviceId::from(format!("DEV{i:03}")), statuses[i % 3]))
        .collect();

    let report = f.coordinator.batch_update_status(updates.clone()).await;

    assert!(report.is_complete());
    assert!(!report.fallback_used);
    assert_eq!(report.requested, 250);
    assert_eq!(report.changed, 250);
    assert_eq!(report.created, 250);
    // 84 + 83 + 83 rows, one chunk each at size 100.
    assert_eq!(report.chunks, 3);
    assert_eq!(f.store.batch_calls(), 3);
    assert_eq!(f.store.len(), 250);

    for (id, status) in &updates {
        assert_eq!(f.coordinator.get_status(id).await, *status);
    }
    assert_eq!(events(&f.cache).len(), 250);
}

#[tokio::test]
async fn test_batch_falls_back_to_single_writes() {
    let f = fixture_with(StatusConfig {
        batch_chunk_size: 10,
        ..Default::default()
    });
    f.store.fail_batch_writes(true);

    let updates = (0..25).map(|i| (DeviceId::from(format!("D{i}")), DeviceStatus::Online));
    let report = f.coordinator.batch_update_status(updates).await;

    assert!(report.fallback_used);
    assert!(report.is_complete());
    assert_eq!(report.changed, 25);
    assert_eq!(f.store.batch_calls(), 1);
    assert_eq!(f.store.save_calls(), 25);
    assert_eq!(f.collector.changes().len(), 25);
}

#[tokio::test]
async fn test_store_write_failure_leaves_no_trace() {
    let f = fixture();
    f.store.fail_writes(true);
    let id = DeviceId::from("D1");

    assert!(!f.coordinator.update_status(&id, DeviceStatus::Online).await);
    assert!(!f.coordinator.set_error(&id, "boom").await);

    assert_eq!(f.coordinator.get_status(&id).await, DeviceStatus::Unknown);
    assert!(f.collector.changes().is_empty());
    assert!(events(&f.cache).is_empty());
}

#[tokio::test]
async fn test_cache_outage_still_notifies_listeners() {
    let f = fixture();
    f.cache.fail_all(true);
    let id = DeviceId::from("D1");

    assert!(f.coordinator.update_status(&id, DeviceStatus::Online).await);
    assert_eq!(f.coordinator.get_status(&id).await, DeviceStatus::Online);
    assert_eq!(f.collector.changes().len(), 1);
    // Publishing failed with the cache.
    f.cache.fail_all(false);
    assert!(events(&f.cache).is_empty());
}

#[tokio::test]
async fn test_failing_listener_does_not_block_others() {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let coordinator = DeviceStatusCoordinator::new(store, cache.clone());
    let collector = Arc::new(Collector::default());
    coordinator.register_listener(Arc::new(Failing));
    coordinator.register_listener(collector.clone());

    assert!(
        coordinator
            .update_status(&DeviceId::from("D1"), DeviceStatus::Online)
            .await
    );
    assert_eq!(collector.changes().len(), 1);
    assert_eq!(cache.published(CHANNEL).len(), 1);
    assert_eq!(coordinator.listener_names(), vec!["failing", "collector"]);

    assert!(coordinator.unregister_listener("failing"));
    assert_eq!(coordinator.listener_names(), vec!["collector"]);
}

#[tokio::test]
async fn test_subscriber_receives_published_event() {
    let f = fixture();
    let mut rx = f.cache.subscribe(CHANNEL);

    f.coordinator
        .update_status(&DeviceId::from("GATE-2"), DeviceStatus::Maintenance)
        .await;

    let event: StatusChangeEvent = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(event.device_id, "GATE-2");
    assert_eq!(event.new_status, "MAINTENANCE");
    assert_eq!(event.new_status_code, 4);
}

#[rstest]
#[case("1", DeviceStatus::Online)]
#[case("2", DeviceStatus::Offline)]
#[case("0", DeviceStatus::Unknown)]
#[case("3", DeviceStatus::Fault)]
#[case("ONLINE", DeviceStatus::Online)]
#[case("garbage", DeviceStatus::Unknown)]
#[tokio::test]
async fn test_store_status_decoding(#[case] raw: &str, #[case] expected: DeviceStatus) {
    let f = fixture();
    f.store.insert(DeviceRecord {
        device_id: DeviceId::from("D1"),
        status: raw.to_string(),
        last_online: None,
    });

    assert_eq!(f.coordinator.get_status(&DeviceId::from("D1")).await, expected);
}
