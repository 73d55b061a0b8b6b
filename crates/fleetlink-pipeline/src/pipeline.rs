//! The composed pipeline.

use crate::command::{Command, CommandOutcome, CommandRequest};
use crate::executor::{AdapterExecutor, CommandExecutor};
use crate::logging::{
    ExecutionRecord, ExecutionSink, ExecutionStats, LoggingExecutor, RecordingSink, StatsSnapshot,
};
use crate::retry::{RetryExecutor, RetryPolicy};
use fleetlink_adapter::AdapterRegistry;
use fleetlink_core::constants::DEFAULT_EXECUTION_HISTORY;
use fleetlink_core::{Device, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    /// Execution records kept by the default sink.
    pub history_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            history_capacity: DEFAULT_EXECUTION_HISTORY,
        }
    }
}

type Layers = LoggingExecutor<RetryExecutor<AdapterExecutor>>;

/// Logging, retry and adapter execution, composed once.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fleetlink_adapter::AdapterRegistry;
/// use fleetlink_adapter::mock::MockAdapter;
/// use fleetlink_core::{Device, DeviceType, ErrorKind};
/// use fleetlink_pipeline::{Command, CommandPipeline};
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let (adapter, handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
/// let registry = AdapterRegistry::builder().adapter("ZKTECO", Arc::new(adapter)).build();
/// let pipeline = CommandPipeline::new(Arc::new(registry));
///
/// handle.fail_next(ErrorKind::DeviceBusy, 1);
/// let device = Device::new("ACC-01", DeviceType::Access, "ZKTECO");
/// let outcome = pipeline.run(device, Command::TestConnection).await.unwrap();
///
/// assert_eq!(outcome.retry_count, 1);
/// assert_eq!(pipeline.stats().total, 1);
/// # }
/// ```
pub struct CommandPipeline {
    layers: Layers,
    history: Arc<RecordingSink>,
}

impl CommandPipeline {
    /// Pipeline with default settings.
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self::builder(registry).build()
    }

    pub fn builder(registry: Arc<AdapterRegistry>) -> CommandPipelineBuilder {
        CommandPipelineBuilder {
            registry,
            config: PipelineConfig::default(),
            extra_sink: None,
        }
    }

    /// Run `command` on `device` through its protocol tag.
    pub async fn run(&self, device: Device, command: Command) -> Result<CommandOutcome> {
        self.execute(&CommandRequest::new(device, command)).await
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        self.layers.inner().inner().registry()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.layers.inner().policy()
    }

    /// Recent execution records, oldest first.
    pub fn history(&self) -> &RecordingSink {
        &self.history
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.layers.stats().snapshot()
    }

    pub fn stats_handle(&self) -> Arc<ExecutionStats> {
        Arc::clone(self.layers.stats())
    }
}

impl CommandExecutor for CommandPipeline {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        self.layers.execute(request).await
    }
}

/// Builder for [`CommandPipeline`].
pub struct CommandPipelineBuilder {
    registry: Arc<AdapterRegistry>,
    config: PipelineConfig,
    extra_sink: Option<Arc<dyn ExecutionSink>>,
}

impl CommandPipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Also send execution records to `sink`.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ExecutionSink>) -> Self {
        self.extra_sink = Some(sink);
        self
    }

    pub fn build(self) -> CommandPipeline {
        let history = Arc::new(RecordingSink::with_capacity(self.config.history_capacity));

        let sink: Arc<dyn ExecutionSink> = match self.extra_sink {
            Some(extra) => Arc::new(FanOut(vec![history.clone() as Arc<dyn ExecutionSink>, extra])),
            None => history.clone(),
        };

        let layers = LoggingExecutor::new(
            RetryExecutor::new(AdapterExecutor::new(self.registry), self.config.retry),
            sink,
        );

        CommandPipeline { layers, history }
    }
}

/// Forwards each record to several sinks.
struct FanOut(Vec<Arc<dyn ExecutionSink>>);

impl ExecutionSink for FanOut {
    fn record(&self, record: ExecutionRecord) {
        if let Some((last, rest)) = self.0.split_last() {
            for sink in rest {
                sink.record(record.clone());
            }
            last.record(record);
        }
    }
}
