//! Message handlers installed by the gateway.
//!
//! Domain handlers accept business events pushed by devices (card swipes,
//! clock-ins, purchases). Adapter handlers turn command messages into
//! pipeline calls against the addressed device.

use async_trait::async_trait;
use fleetlink_adapter::PersonRecord;
use fleetlink_core::{Device, DeviceId, ErrorKind, ProtocolError, Result};
use fleetlink_pipeline::{Command, CommandExecutor, CommandOutput, CommandPipeline, CommandRequest};
use fleetlink_router::{BusinessDomain, DeviceMessage, MessageHandler};
use fleetlink_status::DeviceStatusCoordinator;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Configured devices by id.
pub type Fleet = Arc<BTreeMap<DeviceId, Device>>;

/// Payload field every event of `domain` must carry.
fn required_field(domain: BusinessDomain) -> &'static str {
    match domain {
        BusinessDomain::Access => "card_number",
        BusinessDomain::Attendance => "person_id",
        BusinessDomain::Consume => "amount",
    }
}

/// Accepts events for one business domain.
///
/// An event proves the device is alive, so it is folded into the device's
/// status as a successful call.
pub struct DomainHandler {
    domain: BusinessDomain,
    coordinator: Arc<DeviceStatusCoordinator>,
}

impl DomainHandler {
    pub fn new(domain: BusinessDomain, coordinator: Arc<DeviceStatusCoordinator>) -> Self {
        Self {
            domain,
            coordinator,
        }
    }
}

#[async_trait]
impl MessageHandler for DomainHandler {
    async fn handle(&self, message: &DeviceMessage) -> Result<Value> {
        let field = required_field(self.domain);
        if message.payload.get(field).is_none_or(Value::is_null) {
            return Err(ProtocolError::new(
                ErrorKind::ValidationFailed,
                format!("{} event without {field}", self.domain),
            )
            .in_context(message.device_id.as_str(), &message.message_type));
        }

        let ok: std::result::Result<(), ProtocolError> = Ok(());
        self.coordinator.apply_outcome(&message.device_id, &ok).await;

        debug!(
            domain = %self.domain,
            device_id = %message.device_id,
            message_type = %message.message_type,
            "Event accepted"
        );
        Ok(json!({
            "domain": self.domain.as_key(),
            "deviceId": message.device_id,
            "messageType": message.message_type,
            "accepted": true,
        }))
    }
}

/// Runs command messages addressed to one adapter through the pipeline.
///
/// The handler is bound to one adapter tag and only serves devices whose
/// protocol is that tag; the command always runs on the bound adapter.
///
/// Supported message types: `test_connection`, `dispatch_person`,
/// `delete_person`, `query_status`, `query_persons`.
pub struct AdapterCommandHandler {
    tag: String,
    pipeline: Arc<CommandPipeline>,
    coordinator: Arc<DeviceStatusCoordinator>,
    fleet: Fleet,
}

impl AdapterCommandHandler {
    pub fn new(
        tag: impl AsRef<str>,
        pipeline: Arc<CommandPipeline>,
        coordinator: Arc<DeviceStatusCoordinator>,
        fleet: Fleet,
    ) -> Self {
        Self {
            tag: normalize_tag(tag.as_ref()),
            pipeline,
            coordinator,
            fleet,
        }
    }
}

#[async_trait]
impl MessageHandler for AdapterCommandHandler {
    async fn handle(&self, message: &DeviceMessage) -> Result<Value> {
        let device = self.fleet.get(&message.device_id).cloned().ok_or_else(|| {
            ProtocolError::configuration(format!("device {} is not configured", message.device_id))
                .with_device(message.device_id.as_str())
        })?;
        if normalize_tag(&device.protocol) != self.tag {
            return Err(ProtocolError::new(
                ErrorKind::DeviceNotSupported,
                format!(
                    "device {} speaks {}, not {}",
                    device.id, device.protocol, self.tag
                ),
            )
            .in_context(device.id.as_str(), &message.message_type));
        }
        let command = parse_command(message)?;

        let request = CommandRequest::new(device, command).with_adapter_tag(&self.tag);
        let result = self.pipeline.execute(&request).await;
        self.coordinator
            .apply_outcome(&message.device_id, &result)
            .await;

        let outcome = result?;
        let mut reply = output_to_json(&outcome.output)?;
        if let Value::Object(map) = &mut reply {
            map.insert("retryCount".into(), json!(outcome.retry_count));
        }
        Ok(reply)
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_ascii_uppercase()
}

fn parse_command(message: &DeviceMessage) -> Result<Command> {
    let payload = &message.payload;
    let command = match message.message_type.as_str() {
        "test_connection" => Command::TestConnection,
        "query_status" => Command::QueryStatus,
        "query_persons" => Command::QueryPersons,
        "dispatch_person" => {
            let person: PersonRecord = serde_json::from_value(payload.clone())
                .map_err(|e| ProtocolError::data_format(format!("invalid person payload: {e}")))?;
            Command::DispatchPerson(person)
        }
        "delete_person" => {
            let person_id = payload
                .get("person_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ProtocolError::data_format("delete_person without person_id"))?;
            Command::DeletePerson {
                person_id: person_id.to_string(),
            }
        }
        other => {
            return Err(ProtocolError::data_format(format!(
                "unsupported message type {other}"
            ))
            .with_device(message.device_id.as_str()));
        }
    };
    Ok(command)
}

fn output_to_json(output: &CommandOutput) -> Result<Value> {
    let value = match output {
        CommandOutput::Connection(result) => serde_json::to_value(result),
        CommandOutput::Dispatch(result) => serde_json::to_value(result),
        CommandOutput::Status(report) => serde_json::to_value(report),
        CommandOutput::Persons(ids) => Ok(json!({ "persons": ids })),
    };
    value.map_err(|e| ProtocolError::data_format(format!("unencodable result: {e}")))
}
