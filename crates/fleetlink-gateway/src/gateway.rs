//! Gateway wiring.
//!
//! Builds every component from a [`GatewayConfig`] and connects them:
//!
//! ```text
//! device message -> MessageRouter -> handler -> CommandPipeline -> adapter
//!                                        \-> DeviceStatusCoordinator
//! ```

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::handlers::{AdapterCommandHandler, DomainHandler, Fleet};
use crate::simulated;
use fleetlink_adapter::mock::MockAdapterHandle;
use fleetlink_adapter::{AdapterDescriptor, AdapterRegistry};
use fleetlink_core::{Device, DeviceId, DeviceStatus, DeviceStatusRecord, ProtocolError};
use fleetlink_pipeline::{Command, CommandPipeline, StatsSnapshot};
use fleetlink_router::{BusinessDomain, DeviceMessage, MessageRouter};
use fleetlink_status::{
    DeviceStatusCoordinator, HeartbeatHandle, HeartbeatMonitor, InMemoryCache, InMemoryStore,
};
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of one health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub device_id: DeviceId,
    pub reachable: bool,
    /// Status after the outcome was applied.
    pub status: DeviceStatus,
    pub retry_count: u32,
    pub error: Option<String>,
}

/// Fully wired gateway over in-memory substrates and simulated adapters.
pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<AdapterRegistry>,
    pipeline: Arc<CommandPipeline>,
    router: MessageRouter,
    coordinator: Arc<DeviceStatusCoordinator>,
    store: Arc<InMemoryStore>,
    cache: Arc<InMemoryCache>,
    fleet: Fleet,
    simulators: BTreeMap<String, MockAdapterHandle>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(AdapterRegistry::new());
        let simulators = simulated::register_simulated(&registry);

        let pipeline = Arc::new(
            CommandPipeline::builder(Arc::clone(&registry))
                .config(config.pipeline.clone())
                .build(),
        );

        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let coordinator = Arc::new(DeviceStatusCoordinator::with_config(
            store.clone(),
            cache.clone(),
            config.status.clone(),
        ));

        let fleet: Fleet = Arc::new(
            config
                .devices
                .iter()
                .map(|d| (d.device_id(), d.to_device()))
                .collect(),
        );

        let router = MessageRouter::new();
        for domain in BusinessDomain::ALL {
            router.register_handler(
                domain,
                Arc::new(DomainHandler::new(domain, Arc::clone(&coordinator))),
            );
        }
        for tag in registry.list_registered() {
            router.register_adapter_handler(
                &tag,
                Arc::new(AdapterCommandHandler::new(
                    &tag,
                    Arc::clone(&pipeline),
                    Arc::clone(&coordinator),
                    Arc::clone(&fleet),
                )),
            );
        }

        info!(
            devices = fleet.len(),
            adapters = registry.len(),
            "Gateway ready"
        );

        Ok(Self {
            config,
            registry,
            pipeline,
            router,
            coordinator,
            store,
            cache,
            fleet,
            simulators,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &Arc<CommandPipeline> {
        &self.pipeline
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn coordinator(&self) -> &Arc<DeviceStatusCoordinator> {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<InMemoryCache> {
        &self.cache
    }

    /// Control handle of the simulated adapter behind `tag`.
    pub fn simulator(&self, tag: &str) -> Option<&MockAdapterHandle> {
        self.simulators.get(&tag.trim().to_ascii_uppercase())
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.fleet.get(id)
    }

    /// `(tag, descriptor)` for every registered adapter, in tag order.
    pub fn adapter_descriptors(&self) -> Vec<(String, AdapterDescriptor)> {
        self.registry.descriptors()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats()
    }

    /// Test one device's connection and fold the outcome into its status.
    pub async fn check_device(&self, id: &DeviceId) -> Result<HealthReport> {
        let device = self
            .fleet
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownDevice(id.clone()))?;

        let result = self
            .pipeline
            .run(device, Command::TestConnection)
            .await
            .and_then(|outcome| match outcome.output.as_connection() {
                Some(test) if !test.reachable => {
                    Err(ProtocolError::device_offline(id.as_str())
                        .with_retry_count(outcome.retry_count))
                }
                _ => Ok(outcome),
            });

        self.coordinator.apply_outcome(id, &result).await;
        let status = self.coordinator.get_status(id).await;

        let report = match result {
            Ok(outcome) => HealthReport {
                device_id: id.clone(),
                reachable: true,
                status,
                retry_count: outcome.retry_count,
                error: None,
            },
            Err(e) => {
                warn!(device_id = %id, error = %e, "Health check failed");
                HealthReport {
                    device_id: id.clone(),
                    reachable: false,
                    status,
                    retry_count: e.retry_count,
                    error: Some(e.to_string()),
                }
            }
        };
        Ok(report)
    }

    /// Health-check every configured device concurrently.
    pub async fn check_all(&self) -> Vec<HealthReport> {
        let checks = self.fleet.keys().map(|id| self.check_device(id));
        join_all(checks)
            .await
            .into_iter()
            .filter_map(|report| report.ok())
            .collect()
    }

    /// Route a business event to its domain handler.
    pub async fn handle_event(
        &self,
        domain: BusinessDomain,
        message: &DeviceMessage,
    ) -> fleetlink_core::Result<Value> {
        self.router.dispatch(domain, message).await
    }

    /// Route a command message to the handler of the device's adapter.
    pub async fn handle_command(&self, message: &DeviceMessage) -> Result<Value> {
        let device = self
            .fleet
            .get(&message.device_id)
            .ok_or_else(|| GatewayError::UnknownDevice(message.device_id.clone()))?;
        Ok(self
            .router
            .dispatch_to_adapter(&device.protocol, message)
            .await?)
    }

    /// Status records of the configured fleet, in id order.
    ///
    /// Devices never seen have no record and are reported as `Unknown`.
    pub async fn status_table(&self) -> Vec<DeviceStatusRecord> {
        let mut table = Vec::with_capacity(self.fleet.len());
        for id in self.fleet.keys() {
            let record = match self.coordinator.status_record(id).await {
                Some(record) => record,
                None => DeviceStatusRecord::new(id.clone(), DeviceStatus::Unknown),
            };
            table.push(record);
        }
        table
    }

    pub fn heartbeat_monitor(&self) -> HeartbeatMonitor {
        HeartbeatMonitor::new(Arc::clone(&self.coordinator), self.config.heartbeat.clone())
    }

    /// Run `rounds` health-check rounds, `pause` apart, with the heartbeat
    /// monitor running in the background when enabled.
    pub async fn run(&self, rounds: usize, pause: Duration) -> Vec<Vec<HealthReport>> {
        let monitor: Option<HeartbeatHandle> = self
            .config
            .heartbeat
            .enabled
            .then(|| self.heartbeat_monitor().spawn());

        let mut history = Vec::with_capacity(rounds);
        for round in 0..rounds {
            if round > 0 {
                tokio::time::sleep(pause).await;
            }
            let reports = self.check_all().await;
            let reachable = reports.iter().filter(|r| r.reachable).count();
            info!(
                round = round + 1,
                reachable,
                total = reports.len(),
                "Health check round complete"
            );
            history.push(reports);
        }

        if let Some(monitor) = monitor {
            monitor.shutdown().await;
        }
        history
    }
}
