//! The protocol adapter contract.
//!
//! Unlike most traits in this workspace, [`ProtocolAdapter`] is used through
//! trait objects: the registry stores `Arc<dyn ProtocolAdapter>` and resolves
//! them by tag at dispatch time. Native `async fn` in traits is not object-safe,
//! so the async methods go through `async_trait`.

use crate::descriptor::AdapterDescriptor;
use crate::types::{
    BiometricTemplate, ConfigPayload, ConnectionTestResult, DeviceStatusReport, DispatchResult,
    ItemFailure, PersonRecord,
};
use async_trait::async_trait;
use fleetlink_core::constants::DEFAULT_OPERATION_TIMEOUT_MS;
use fleetlink_core::{Device, DeviceType, Result};
use std::collections::BTreeSet;
use std::time::Duration;

/// Contract every vendor/protocol integration implements.
///
/// # Rules for implementors
///
/// - Every call must finish within [`operation_timeout`](Self::operation_timeout);
///   the pipeline enforces the bound and reports a timeout error otherwise.
/// - Single dispatches are all-or-nothing. An adapter that cannot guarantee
///   that must fail with `ErrorKind::TemporaryError` so the whole call is retried.
/// - Batch dispatches report per-item failures in the [`DispatchResult`] and only
///   raise when the batch could not be attempted at all.
/// - Adapters never update device status; the caller reports outcomes.
///
/// # Examples
///
/// ```
/// use fleetlink_adapter::ProtocolAdapter;
/// use fleetlink_adapter::mock::MockAdapter;
/// use fleetlink_core::{Device, DeviceType};
///
/// # #[tokio::main]
/// # async fn main() -> fleetlink_core::Result<()> {
/// let (adapter, _handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
/// let device = Device::new("ACC-01", DeviceType::Access, "ZKTECO").with_manufacturer("ZKTECO");
///
/// assert!(adapter.supports_device(&device));
/// let result = adapter.test_connection(&device).await?;
/// assert!(result.reachable);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Adapter name, used in logs and as the adapter-level routing key.
    fn name(&self) -> &str;

    /// Device family this adapter drives.
    fn supported_device_type(&self) -> DeviceType;

    /// Upper-cased manufacturer tags this adapter understands.
    fn supported_manufacturers(&self) -> BTreeSet<String>;

    /// Whether this adapter can drive `device`. Pure, no I/O.
    fn supports_device(&self, device: &Device) -> bool {
        device.device_type == self.supported_device_type()
            && self
                .supported_manufacturers()
                .contains(&device.manufacturer_or_generic())
    }

    /// Upper bound for any single call on this adapter.
    fn operation_timeout(&self) -> Duration {
        Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS)
    }

    /// Check that the device answers.
    ///
    /// # Errors
    ///
    /// `ConnectionFailed` when the device refuses the connection,
    /// `ConnectionTimeout` when it does not answer in time.
    async fn test_connection(&self, device: &Device) -> Result<ConnectionTestResult>;

    /// Push one person record.
    async fn dispatch_person_data(
        &self,
        device: &Device,
        person: &PersonRecord,
    ) -> Result<DispatchResult>;

    /// Push one biometric template.
    async fn dispatch_biometric_data(
        &self,
        device: &Device,
        template: &BiometricTemplate,
    ) -> Result<DispatchResult>;

    /// Push device configuration.
    async fn dispatch_config_data(
        &self,
        device: &Device,
        config: &ConfigPayload,
    ) -> Result<DispatchResult>;

    /// Push many person records and report an aggregate outcome.
    ///
    /// The default implementation dispatches sequentially. Only retryable
    /// failures that hit the very first item abort the batch; anything else
    /// is recorded as an item failure.
    async fn batch_dispatch_person_data(
        &self,
        device: &Device,
        persons: &[PersonRecord],
    ) -> Result<DispatchResult> {
        let mut failures = Vec::new();

        for (index, person) in persons.iter().enumerate() {
            match self.dispatch_person_data(device, person).await {
                Ok(result) if result.is_complete_success() => {}
                Ok(result) => failures.push(ItemFailure {
                    item_id: person.person_id.clone(),
                    reason: result
                        .message
                        .unwrap_or_else(|| "rejected by device".to_string()),
                }),
                Err(e) if index == 0 && e.is_retryable() => return Err(e),
                Err(e) => failures.push(ItemFailure {
                    item_id: person.person_id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        Ok(DispatchResult::from_failures(persons.len(), failures))
    }

    /// Read the device's own view of its status.
    async fn get_device_status(&self, device: &Device) -> Result<DeviceStatusReport>;

    /// List the person ids stored on the device.
    async fn query_persons_on_device(&self, device: &Device) -> Result<Vec<String>>;

    /// Remove a person from the device.
    async fn delete_person_data(&self, device: &Device, person_id: &str) -> Result<DispatchResult>;

    /// Describe this adapter.
    fn capabilities(&self) -> AdapterDescriptor;
}

