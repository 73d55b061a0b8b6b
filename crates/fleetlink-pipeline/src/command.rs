//! Commands, requests and outcomes flowing through the pipeline.

use fleetlink_adapter::{
    BiometricTemplate, ConfigPayload, ConnectionTestResult, DeviceStatusReport, DispatchResult,
    PersonRecord,
};
use fleetlink_core::Device;
use std::time::Duration;
use tokio::time::Instant;

/// Operation to run against a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TestConnection,
    DispatchPerson(PersonRecord),
    DispatchBiometric(BiometricTemplate),
    DispatchConfig(ConfigPayload),
    BatchDispatchPersons(Vec<PersonRecord>),
    QueryStatus,
    QueryPersons,
    DeletePerson { person_id: String },
}

impl Command {
    /// Operation name, matching the adapter method it invokes.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::TestConnection => "test_connection",
            Self::DispatchPerson(_) => "dispatch_person_data",
            Self::DispatchBiometric(_) => "dispatch_biometric_data",
            Self::DispatchConfig(_) => "dispatch_config_data",
            Self::BatchDispatchPersons(_) => "batch_dispatch_person_data",
            Self::QueryStatus => "get_device_status",
            Self::QueryPersons => "query_persons_on_device",
            Self::DeletePerson { .. } => "delete_person_data",
        }
    }
}

/// Value returned by a successful command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Connection(ConnectionTestResult),
    Dispatch(DispatchResult),
    Status(DeviceStatusReport),
    Persons(Vec<String>),
}

impl CommandOutput {
    pub fn as_dispatch(&self) -> Option<&DispatchResult> {
        match self {
            Self::Dispatch(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_connection(&self) -> Option<&ConnectionTestResult> {
        match self {
            Self::Connection(result) => Some(result),
            _ => None,
        }
    }
}

/// Successful command result plus the number of re-attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub output: CommandOutput,
    pub retry_count: u32,
}

impl CommandOutcome {
    pub fn new(output: CommandOutput) -> Self {
        Self {
            output,
            retry_count: 0,
        }
    }
}

/// A command addressed to a device.
///
/// The adapter tag defaults to the device's protocol tag.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fleetlink_core::{Device, DeviceType};
/// use fleetlink_pipeline::{Command, CommandRequest};
///
/// let device = Device::new("CAM001", DeviceType::Video, "HIKVISION");
/// let request = CommandRequest::new(device, Command::TestConnection)
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(request.adapter_tag, "HIKVISION");
/// assert_eq!(request.operation(), "test_connection");
/// assert!(request.deadline.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub device: Device,
    pub command: Command,
    pub adapter_tag: String,
    /// Overall bound covering every attempt, backoff included.
    pub deadline: Option<Instant>,
}

impl CommandRequest {
    pub fn new(device: Device, command: Command) -> Self {
        let adapter_tag = device.protocol.clone();
        Self {
            device,
            command,
            adapter_tag,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_adapter_tag(mut self, tag: impl Into<String>) -> Self {
        self.adapter_tag = tag.into();
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.command.operation()
    }

    /// Time left before the deadline, `None` when there is no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
