//! The executor seam and the innermost adapter-invoking layer.

use crate::command::{Command, CommandOutcome, CommandOutput, CommandRequest};
use fleetlink_adapter::{AdapterRegistry, ProtocolAdapter};
use fleetlink_core::{Device, ProtocolError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Executes a [`CommandRequest`].
///
/// The pipeline layers wrap each other through this trait. Composition is
/// static (`LoggingExecutor<RetryExecutor<AdapterExecutor>>`), so no trait
/// objects are involved and implementors can use plain `async fn`.
pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        request: &CommandRequest,
    ) -> impl Future<Output = Result<CommandOutcome>> + Send;
}

/// Resolves the adapter and runs the command on it under a time bound.
///
/// The bound is the adapter's declared operation timeout, shortened to the
/// time left before the request deadline. When it elapses the call fails with
/// `ConnectionTimeout` for connection tests and `OperationTimeout` otherwise.
#[derive(Debug, Clone)]
pub struct AdapterExecutor {
    registry: Arc<AdapterRegistry>,
}

impl AdapterExecutor {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    async fn run(
        adapter: &dyn ProtocolAdapter,
        device: &Device,
        command: &Command,
    ) -> Result<CommandOutput> {
        match command {
            Command::TestConnection => adapter
                .test_connection(device)
                .await
                .map(CommandOutput::Connection),
            Command::DispatchPerson(person) => adapter
                .dispatch_person_data(device, person)
                .await
                .map(CommandOutput::Dispatch),
            Command::DispatchBiometric(template) => adapter
                .dispatch_biometric_data(device, template)
                .await
                .map(CommandOutput::Dispatch),
            Command::DispatchConfig(config) => adapter
                .dispatch_config_data(device, config)
                .await
                .map(CommandOutput::Dispatch),
            Command::BatchDispatchPersons(persons) => adapter
                .batch_dispatch_person_data(device, persons)
                .await
                .map(CommandOutput::Dispatch),
            Command::QueryStatus => adapter
                .get_device_status(device)
                .await
                .map(CommandOutput::Status),
            Command::QueryPersons => adapter
                .query_persons_on_device(device)
                .await
                .map(CommandOutput::Persons),
            Command::DeletePerson { person_id } => adapter
                .delete_person_data(device, person_id)
                .await
                .map(CommandOutput::Dispatch),
        }
    }

    fn timeout_error(command: &Command, bound: Duration) -> ProtocolError {
        let ms = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX);
        match command {
            Command::TestConnection => ProtocolError::connection_timeout(ms),
            _ => ProtocolError::operation_timeout(ms),
        }
    }
}

impl CommandExecutor for AdapterExecutor {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        let device_id = request.device.id.as_str();
        let operation = request.operation();

        let adapter = self
            .registry
            .resolve(&request.adapter_tag)
            .map_err(|e| e.in_context(device_id, operation))?;

        let bound = match request.remaining() {
            Some(remaining) => adapter.operation_timeout().min(remaining),
            None => adapter.operation_timeout(),
        };

        debug!(
            device_id,
            operation,
            adapter = adapter.name(),
            bound_ms = bound.as_millis() as u64,
            "Invoking adapter"
        );

        let call = Self::run(adapter.as_ref(), &request.device, &request.command);
        match tokio::time::timeout(bound, call).await {
            Ok(Ok(output)) => Ok(CommandOutcome::new(output)),
            Ok(Err(e)) => Err(e.in_context(device_id, operation)),
            Err(_) => Err(Self::timeout_error(&request.command, bound).in_context(device_id, operation)),
        }
    }
}
