//! Scriptable in-memory protocol adapter.

use crate::descriptor::{AdapterCapabilities, AdapterDescriptor};
use crate::traits::ProtocolAdapter;
use crate::types::{
    BiometricTemplate, ConfigPayload, ConnectionTestResult, DeviceStatusReport, DispatchResult,
    ItemFailure, PersonRecord,
};
use async_trait::async_trait;
use fleetlink_core::constants::{DEFAULT_OPERATION_TIMEOUT_MS, GENERIC_MANUFACTURER};
use fleetlink_core::{Device, DeviceStatus, DeviceType, ErrorKind, ProtocolError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct MockState {
    /// Failures returned by the next calls, front first.
    failures: VecDeque<ErrorKind>,

    /// Delay applied to every call.
    latency: Duration,

    /// Calls per operation name.
    calls: HashMap<&'static str, u32>,

    /// Persons currently stored on the simulated device.
    persons: BTreeMap<String, PersonRecord>,

    /// Person ids the device refuses.
    rejected: BTreeSet<String>,

    /// Last configuration pushed.
    config: Option<ConfigPayload>,

    /// Status answered by `get_device_status`.
    reported_status: DeviceStatus,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            failures: VecDeque::new(),
            latency: Duration::ZERO,
            calls: HashMap::new(),
            persons: BTreeMap::new(),
            rejected: BTreeSet::new(),
            config: None,
            reported_status: DeviceStatus::Online,
        }
    }
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock protocol adapter.
///
/// Supports its own name (upper-cased) and `GENERIC` as manufacturers unless
/// configured otherwise.
///
/// # Examples
///
/// ```
/// use fleetlink_adapter::{PersonRecord, ProtocolAdapter};
/// use fleetlink_adapter::mock::MockAdapter;
/// use fleetlink_core::{Device, DeviceType, ErrorKind};
///
/// # #[tokio::main]
/// # async fn main() {
/// let (adapter, handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
/// let device = Device::new("ACC-01", DeviceType::Access, "ZKTECO");
///
/// handle.fail_next(ErrorKind::DeviceBusy, 1);
/// let err = adapter
///     .dispatch_person_data(&device, &PersonRecord::new("P1", "Ana"))
///     .await
///     .unwrap_err();
/// assert_eq!(err.kind, ErrorKind::DeviceBusy);
///
/// adapter
///     .dispatch_person_data(&device, &PersonRecord::new("P1", "Ana"))
///     .await
///     .unwrap();
/// assert_eq!(handle.stored_persons(), vec!["P1".to_string()]);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockAdapter {
    name: String,
    device_type: DeviceType,
    manufacturers: BTreeSet<String>,
    timeout: Duration,
    descriptor: Option<AdapterDescriptor>,
    state: SharedState,
}

impl MockAdapter {
    /// Create a mock adapter and the handle that controls it.
    pub fn new(name: impl Into<String>, device_type: DeviceType) -> (Self, MockAdapterHandle) {
        let name = name.into();
        let state: SharedState = Arc::default();

        let manufacturers = [name.trim().to_ascii_uppercase(), GENERIC_MANUFACTURER.to_string()]
            .into_iter()
            .collect();

        let adapter = Self {
            name,
            device_type,
            manufacturers,
            timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            descriptor: None,
            state: Arc::clone(&state),
        };

        (adapter, MockAdapterHandle { state })
    }

    /// Replace the supported manufacturer set.
    #[must_use]
    pub fn with_manufacturers<I, S>(mut self, manufacturers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.manufacturers = manufacturers
            .into_iter()
            .map(|m| m.as_ref().trim().to_ascii_uppercase())
            .collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Answer `capabilities()` with this descriptor instead of a derived one.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: AdapterDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Record the call, apply latency and pop a scripted failure.
    async fn begin(&self, operation: &'static str, device: &Device) -> Result<()> {
        let (latency, failure) = {
            let mut state = lock(&self.state);
            *state.calls.entry(operation).or_insert(0) += 1;
            (state.latency, state.failures.pop_front())
        };

        debug!(adapter = %self.name, device_id = %device.id, operation, "Mock call");

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match failure {
            Some(kind) => Err(ProtocolError::new(kind, format!("Scripted {kind} from mock"))
                .in_context(device.id.as_str(), operation)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_device_type(&self) -> DeviceType {
        self.device_type
    }

    fn supported_manufacturers(&self) -> BTreeSet<String> {
        self.manufacturers.clone()
    }

    fn operation_timeout(&self) -> Duration {
        self.timeout
    }

    async fn test_connection(&self, device: &Device) -> Result<ConnectionTestResult> {
        self.begin("test_connection", device).await?;
        let latency = lock(&self.state).latency;
        Ok(ConnectionTestResult::reachable(latency))
    }

    async fn dispatch_person_data(
        &self,
        device: &Device,
        person: &PersonRecord,
    ) -> Result<DispatchResult> {
        self.begin("dispatch_person_data", device).await?;

        let mut state = lock(&self.state);
        if state.rejected.contains(&person.person_id) {
            return Ok(DispatchResult::from_failures(
                1,
                vec![ItemFailure {
                    item_id: person.person_id.clone(),
                    reason: "rejected by device".to_string(),
                }],
            ));
        }

        state.persons.insert(person.person_id.clone(), person.clone());
        Ok(DispatchResult::ok(1))
    }

    async fn dispatch_biometric_data(
        &self,
        device: &Device,
        template: &BiometricTemplate,
    ) -> Result<DispatchResult> {
        self.begin("dispatch_biometric_data", device).await?;

        if template.template.is_empty() {
            return Err(ProtocolError::data_format("Empty biometric template")
                .in_context(device.id.as_str(), "dispatch_biometric_data"));
        }
        Ok(DispatchResult::ok(1))
    }

    async fn dispatch_config_data(
        &self,
        device: &Device,
        config: &ConfigPayload,
    ) -> Result<DispatchResult> {
        self.begin("dispatch_config_data", device).await?;
        lock(&self.state).config = Some(config.clone());
        Ok(DispatchResult::ok(config.entries.len()))
    }

    async fn get_device_status(&self, device: &Device) -> Result<DeviceStatusReport> {
        self.begin("get_device_status", device).await?;

        let state = lock(&self.state);
        let mut report = DeviceStatusReport::new(state.reported_status);
        report.person_count = Some(state.persons.len());
        report.firmware_version = Some("mock-1.0".to_string());
        Ok(report)
    }

    async fn query_persons_on_device(&self, device: &Device) -> Result<Vec<String>> {
        self.begin("query_persons_on_device", device).await?;
        Ok(lock(&self.state).persons.keys().cloned().collect())
    }

    async fn delete_person_data(&self, device: &Device, person_id: &str) -> Result<DispatchResult> {
        self.begin("delete_person_data", device).await?;

        match lock(&self.state).persons.remove(person_id) {
            Some(_) => Ok(DispatchResult::ok(1)),
            None => Ok(DispatchResult::from_failures(
                1,
                vec![ItemFailure {
                    item_id: person_id.to_string(),
                    reason: "person not present on device".to_string(),
                }],
            )),
        }
    }

    fn capabilities(&self) -> AdapterDescriptor {
        if let Some(descriptor) = &self.descriptor {
            return descriptor.clone();
        }

        let mut descriptor = AdapterDescriptor::new(&self.name, "0.1.0", self.device_type)
            .with_protocol(self.name.to_ascii_uppercase())
            .with_capabilities(AdapterCapabilities {
                biometric_dispatch: true,
                batch_dispatch: true,
                max_batch_size: 1000,
                ..Default::default()
            });
        for manufacturer in &self.manufacturers {
            descriptor = descriptor.with_manufacturer(manufacturer);
        }
        descriptor.add_limitation("simulated device, no wire traffic");
        descriptor
    }
}

/// Handle for controlling a [`MockAdapter`].
///
/// Clones share the same state as the adapter.
#[derive(Debug, Clone)]
pub struct MockAdapterHandle {
    state: SharedState,
}

impl MockAdapterHandle {
    /// Fail the next `times` calls with `kind`.
    pub fn fail_next(&self, kind: ErrorKind, times: usize) {
        let mut state = lock(&self.state);
        state.failures.extend(std::iter::repeat_n(kind, times));
    }

    /// Drop any scripted failures that have not fired yet.
    pub fn clear_failures(&self) {
        lock(&self.state).failures.clear();
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    /// Status the device reports about itself.
    pub fn set_reported_status(&self, status: DeviceStatus) {
        lock(&self.state).reported_status = status;
    }

    /// Make the device refuse this person id.
    pub fn reject_person(&self, person_id: impl Into<String>) {
        lock(&self.state).rejected.insert(person_id.into());
    }

    /// Total calls made on the adapter.
    pub fn call_count(&self) -> u32 {
        lock(&self.state).calls.values().sum()
    }

    /// Calls made for one operation.
    pub fn calls_for(&self, operation: &str) -> u32 {
        lock(&self.state).calls.get(operation).copied().unwrap_or(0)
    }

    /// Person ids stored on the simulated device, sorted.
    pub fn stored_persons(&self) -> Vec<String> {
        lock(&self.state).persons.keys().cloned().collect()
    }

    /// Last configuration pushed to the device.
    pub fn last_config(&self) -> Option<ConfigPayload> {
        lock(&self.state).config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn device() -> Device {
        Device::new("ACC-01", DeviceType::Access, "ZKTECO")
    }

    #[tokio::test]
    async fn test_scripted_failures_fire_in_order() {
        let (adapter, handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
        handle.fail_next(ErrorKind::ConnectionTimeout, 2);

        for _ in 0..2 {
            let err = adapter.test_connection(&device()).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::ConnectionTimeout);
            assert_eq!(err.device.as_deref(), Some("ACC-01"));
            assert_eq!(err.operation.as_deref(), Some("test_connection"));
        }
        assert!(adapter.test_connection(&device()).await.is_ok());
        assert_eq!(handle.calls_for("test_connection"), 3);
    }

    #[tokio::test]
    async fn test_person_table() {
        let (adapter, handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
        let d = device();

        adapter
            .dispatch_person_data(&d, &PersonRecord::new("P2", "Bo"))
            .await
            .unwrap();
        adapter
            .dispatch_person_data(&d, &PersonRecord::new("P1", "Ana"))
            .await
            .unwrap();

        assert_eq!(
            adapter.query_persons_on_device(&d).await.unwrap(),
            vec!["P1", "P2"]
        );

        assert!(adapter.delete_person_data(&d, "P1").await.unwrap().is_complete_success());
        assert!(!adapter.delete_person_data(&d, "P1").await.unwrap().is_complete_success());
        assert_eq!(handle.stored_persons(), vec!["P2"]);

        let report = adapter.get_device_status(&d).await.unwrap();
        assert_eq!(report.person_count, Some(1));
        assert_eq!(report.status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn test_batch_records_item_failures() {
        let (adapter, handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
        handle.reject_person("P2");

        let persons: Vec<_> = (1..=3)
            .map(|i| PersonRecord::new(format!("P{i}"), format!("Person {i}")))
            .collect();
        let result = adapter
            .batch_dispatch_person_data(&device(), &persons)
            .await
            .unwrap();

        assert_eq!(result.total, 3);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failures[0].item_id, "P2");
    }

    #[tokio::test]
    async fn test_batch_aborts_on_retryable_first_item() {
        let (adapter, handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
        handle.fail_next(ErrorKind::NetworkError, 1);

        let persons = vec![PersonRecord::new("P1", "Ana"), PersonRecord::new("P2", "Bo")];
        let err = adapter
            .batch_dispatch_person_data(&device(), &persons)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NetworkError);
        assert_eq!(handle.calls_for("dispatch_person_data"), 1);
    }

    #[tokio::test]
    async fn test_batch_records_non_retryable_first_item() {
        let (adapter, handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
        handle.fail_next(ErrorKind::ValidationFailed, 1);

        let persons = vec![PersonRecord::new("P1", "Ana"), PersonRecord::new("P2", "Bo")];
        let result = adapter
            .batch_dispatch_person_data(&device(), &persons)
            .await
            .unwrap();

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failures[0].item_id, "P1");
        assert!(result.failures[0].reason.contains("VALIDATION_FAILED"));
        assert_eq!(handle.stored_persons(), vec!["P2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let (adapter, handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
        handle.set_latency(Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        adapter.test_connection(&device()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_empty_biometric_template_is_rejected() {
        let (adapter, _handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
        let template =
            BiometricTemplate::new("P1", crate::types::BiometricKind::Fingerprint, Vec::new());

        let err = adapter
            .dispatch_biometric_data(&device(), &template)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DataFormatError);
    }

    #[rstest]
    #[case(Some("ZKTECO"), DeviceType::Access, true)]
    #[case(Some("zkteco"), DeviceType::Access, true)]
    #[case(None, DeviceType::Access, true)]
    #[case(Some("  "), DeviceType::Access, true)]
    #[case(Some("HIKVISION"), DeviceType::Access, false)]
    #[case(Some("ZKTECO"), DeviceType::Video, false)]
    fn test_supports_device(
        #[case] manufacturer: Option<&str>,
        #[case] device_type: DeviceType,
        #[case] expected: bool,
    ) {
        let (adapter, _handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
        let mut device = Device::new("D1", device_type, "ZKTECO");
        if let Some(m) = manufacturer {
            device = device.with_manufacturer(m);
        }
        assert_eq!(adapter.supports_device(&device), expected);
    }

    #[test]
    fn test_with_manufacturers_drops_generic() {
        let (adapter, _handle) = MockAdapter::new("ENTROPY", DeviceType::Access);
        let adapter = adapter.with_manufacturers(["entropy"]);
        let device = Device::new("D1", DeviceType::Access, "ENTROPY");
        assert!(!adapter.supports_device(&device));
    }

    #[test]
    fn test_derived_descriptor() {
        let (adapter, _handle) = MockAdapter::new("Dahua", DeviceType::Video);
        let descriptor = adapter.capabilities();
        assert!(descriptor.supports_manufacturer("DAHUA"));
        assert!(descriptor.supports_manufacturer("GENERIC"));
        assert!(descriptor.capabilities.batch_dispatch);
        assert_eq!(descriptor.limitations.len(), 1);
    }
}
