//! Heartbeat timeout sweep.
//!
//! Devices report liveness through [`DeviceStatusCoordinator::update_heartbeat`].
//! The monitor periodically marks online devices offline once their last
//! heartbeat is older than the configured timeout.

use crate::config::HeartbeatConfig;
use crate::coordinator::DeviceStatusCoordinator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Online devices examined.
    pub checked: usize,
    pub marked_offline: usize,
}

/// Marks silent devices offline.
pub struct HeartbeatMonitor {
    coordinator: Arc<DeviceStatusCoordinator>,
    config: HeartbeatConfig,
}

impl HeartbeatMonitor {
    pub fn new(coordinator: Arc<DeviceStatusCoordinator>, config: HeartbeatConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep as if the current time were `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let timeout = self.config.timeout();
        let mut report = SweepReport::default();

        for record in self.coordinator.all_records().await {
            if !record.status.is_online() {
                continue;
            }
            report.checked += 1;
            if self
                .coordinator
                .expire_if_stale(&record.device_id, timeout, now)
                .await
            {
                report.marked_offline += 1;
            }
        }

        if report.marked_offline > 0 {
            info!(
                checked = report.checked,
                marked_offline = report.marked_offline,
                "Heartbeat sweep complete"
            );
        } else {
            debug!(checked = report.checked, "Heartbeat sweep complete");
        }
        report
    }

    /// Run the sweep every `sweep_interval` until the handle is shut down.
    pub fn spawn(self) -> HeartbeatHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let period = self.config.sweep_interval();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut total = 0usize;

            loop {
                tokio::select! {
                    () = child.cancelled() => break,
                    _ = interval.tick() => {
                        total += self.sweep().await.marked_offline;
                    }
                }
            }

            debug!(total_marked_offline = total, "Heartbeat monitor stopped");
            total
        });

        info!(interval_secs = period.as_secs(), "Heartbeat monitor started");
        HeartbeatHandle { token, task }
    }
}

/// Handle to a running [`HeartbeatMonitor`].
pub struct HeartbeatHandle {
    token: CancellationToken,
    task: JoinHandle<usize>,
}

impl HeartbeatHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the monitor and wait for it to finish.
    ///
    /// Returns the number of devices it marked offline over its lifetime.
    pub async fn shutdown(self) -> usize {
        self.token.cancel();
        match self.task.await {
            Ok(total) => total,
            Err(e) if e.is_cancelled() => 0,
            Err(e) => {
                error!(error = %e, "Heartbeat monitor panicked");
                0
            }
        }
    }
}
