//! Property tests for batch status updates.

use fleetlink_core::{DeviceId, DeviceStatus};
use fleetlink_status::{DeviceStatusCoordinator, InMemoryCache, InMemoryStore, StatusConfig};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

fn status() -> impl Strategy<Value = DeviceStatus> {
    prop_oneof![
        Just(DeviceStatus::Online),
        Just(DeviceStatus::Offline),
        Just(DeviceStatus::Fault),
        Just(DeviceStatus::Maintenance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever the chunk size, every requested status ends up readable and
    /// exactly the effective transitions are announced.
    #[test]
    fn prop_batch_applies_every_entry(
        updates in prop::collection::btree_map("[A-F][0-9]{1,2}", status(), 0..60),
        seeded in prop::collection::btree_map("[A-F][0-9]{1,2}", status(), 0..20),
        chunk_size in 1usize..40,
        fail_batches in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let cache = Arc::new(InMemoryCache::new());
            let coordinator = DeviceStatusCoordinator::with_config(
                store.clone(),
                cache.clone(),
                StatusConfig { batch_chunk_size: chunk_size, ..Default::default() },
            );

            for (id, status) in &seeded {
                coordinator.update_status(&DeviceId::from(id.as_str()), *status).await;
            }
            let before = cache.published("fleetlink:device:status:change").len();
            store.fail_batch_writes(fail_batches);

            let expected_changes = updates
                .iter()
                .filter(|(id, status)| seeded.get(*id) != Some(*status))
                .count();

            let report = coordinator
                .batch_update_status(
                    updates.iter().map(|(id, s)| (DeviceId::from(id.as_str()), *s)),
                )
                .await;

            prop_assert!(report.is_complete());
            prop_assert_eq!(report.requested, updates.len());
            prop_assert_eq!(report.changed, expected_changes);
            prop_assert_eq!(report.unchanged, updates.len() - expected_changes);

            let ids: Vec<DeviceId> = updates.keys().map(|id| DeviceId::from(id.as_str())).collect();
            let read = coordinator.get_statuses(&ids).await;
            let wanted: BTreeMap<DeviceId, DeviceStatus> = updates
                .iter()
                .map(|(id, s)| (DeviceId::from(id.as_str()), *s))
                .collect();
            prop_assert_eq!(read, wanted);

            let after = cache.published("fleetlink:device:status:change").len();
            prop_assert_eq!(after - before, expected_changes);
            Ok(())
        })?;
    }
}
