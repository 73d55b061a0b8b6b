//! Execution logging layer, execution records and statistics.

use crate::command::{CommandOutcome, CommandRequest};
use crate::executor::CommandExecutor;
use chrono::{DateTime, Utc};
use fleetlink_core::constants::DEFAULT_EXECUTION_HISTORY;
use fleetlink_core::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    Success,
    Failed(ErrorKind),
}

impl ExecutionOutcome {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One executed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub call_id: Uuid,
    pub device_id: String,
    pub adapter_tag: String,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: ExecutionOutcome,
    pub retry_count: u32,
}

/// Destination for execution records.
pub trait ExecutionSink: Send + Sync {
    fn record(&self, record: ExecutionRecord);
}

/// Sink keeping the most recent records in memory.
///
/// Oldest records are dropped once `capacity` is reached.
#[derive(Debug)]
pub struct RecordingSink {
    capacity: usize,
    records: Mutex<VecDeque<ExecutionRecord>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EXECUTION_HISTORY)
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ExecutionRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records, oldest first.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<ExecutionRecord> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl ExecutionSink for RecordingSink {
    fn record(&self, record: ExecutionRecord) {
        let mut records = self.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

/// Running call counters.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Point-in-time copy of [`ExecutionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Calls that needed at least one re-attempt.
    pub retried: u64,
}

impl StatsSnapshot {
    /// Fraction of successful calls, 1.0 when nothing ran yet.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn observe(&self, outcome: ExecutionOutcome, retry_count: u32) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if outcome.is_success() {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if retry_count > 0 {
            self.retried.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
        }
    }
}

/// Records every call of the wrapped executor.
///
/// Outcomes pass through unchanged; this layer only observes.
pub struct LoggingExecutor<E> {
    inner: E,
    sink: Arc<dyn ExecutionSink>,
    stats: Arc<ExecutionStats>,
}

impl<E: CommandExecutor> LoggingExecutor<E> {
    pub fn new(inner: E, sink: Arc<dyn ExecutionSink>) -> Self {
        Self {
            inner,
            sink,
            stats: Arc::new(ExecutionStats::new()),
        }
    }

    pub fn stats(&self) -> &Arc<ExecutionStats> {
        &self.stats
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: CommandExecutor> CommandExecutor for LoggingExecutor<E> {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        let call_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();

        let result = self.inner.execute(request).await;

        let elapsed = clock.elapsed();
        let (outcome, retry_count) = match &result {
            Ok(outcome) => (ExecutionOutcome::Success, outcome.retry_count),
            Err(e) => (ExecutionOutcome::Failed(e.kind), e.retry_count),
        };

        match &result {
            Ok(_) => debug!(
                %call_id,
                device_id = %request.device.id,
                operation = request.operation(),
                elapsed_ms = elapsed.as_millis() as u64,
                retry_count,
                "Command succeeded"
            ),
            Err(e) if e.is_critical() => error!(
                %call_id,
                device_id = %request.device.id,
                operation = request.operation(),
                elapsed_ms = elapsed.as_millis() as u64,
                retry_count,
                error = %e,
                "Command failed with critical error"
            ),
            Err(e) => warn!(
                %call_id,
                device_id = %request.device.id,
                operation = request.operation(),
                elapsed_ms = elapsed.as_millis() as u64,
                retry_count,
                error = %e,
                "Command failed"
            ),
        }

        self.stats.observe(outcome, retry_count);
        self.sink.record(ExecutionRecord {
            call_id,
            device_id: request.device.id.to_string(),
            adapter_tag: request.adapter_tag.clone(),
            operation: request.operation().to_string(),
            started_at,
            finished_at: Utc::now(),
            elapsed,
            outcome,
            retry_count,
        });

        result
    }
}
