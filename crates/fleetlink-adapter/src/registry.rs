//! Adapter registry.
//!
//! Holds the tag → adapter bindings. Registration happens once at start-up
//! from a fixed set of vendor adapters; resolution happens on every dispatched
//! call, so lookups are O(1) and never block on a concurrent re-registration.

use crate::descriptor::AdapterDescriptor;
use crate::traits::ProtocolAdapter;
use dashmap::DashMap;
use fleetlink_core::{Device, ProtocolError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Normalize a registry tag: trimmed, ASCII upper case.
fn normalize(tag: &str) -> String {
    tag.trim().to_ascii_uppercase()
}

/// Registry of protocol adapters keyed by tag.
///
/// Tags are case-insensitive (`"zkteco"` and `"ZKTECO"` are the same binding).
/// Share it between tasks behind an `Arc`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fleetlink_adapter::AdapterRegistry;
/// use fleetlink_adapter::mock::MockAdapter;
/// use fleetlink_core::{DeviceType, ErrorKind};
///
/// let registry = AdapterRegistry::new();
/// let err = registry.resolve("UNKNOWN_TAG").err().unwrap();
/// assert_eq!(err.kind, ErrorKind::DeviceNotSupported);
///
/// let (adapter, _) = MockAdapter::new("DAHUA", DeviceType::Video);
/// registry.register("DAHUA", Arc::new(adapter));
/// assert!(registry.resolve("DAHUA").is_ok());
/// ```
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a builder for start-up registration.
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    /// Bind `adapter` to `tag`, replacing any previous binding.
    ///
    /// Returns the replaced adapter, if there was one.
    pub fn register(
        &self,
        tag: &str,
        adapter: Arc<dyn ProtocolAdapter>,
    ) -> Option<Arc<dyn ProtocolAdapter>> {
        let tag = normalize(tag);
        let name = adapter.name().to_string();
        let previous = self.adapters.insert(tag.clone(), adapter);

        match &previous {
            Some(old) => info!(
                tag = %tag,
                adapter = %name,
                replaced = %old.name(),
                "Protocol adapter binding replaced"
            ),
            None => info!(tag = %tag, adapter = %name, "Protocol adapter registered"),
        }

        previous
    }

    /// Remove the binding for `tag`.
    pub fn unregister(&self, tag: &str) -> Option<Arc<dyn ProtocolAdapter>> {
        let tag = normalize(tag);
        let removed = self.adapters.remove(&tag).map(|(_, adapter)| adapter);
        if removed.is_some() {
            info!(tag = %tag, "Protocol adapter unregistered");
        }
        removed
    }

    /// Look up the adapter bound to `tag`.
    ///
    /// # Errors
    ///
    /// `DeviceNotSupported` if nothing is bound to the tag.
    pub fn resolve(&self, tag: &str) -> Result<Arc<dyn ProtocolAdapter>> {
        let key = normalize(tag);
        self.adapters
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                debug!(tag = %key, "No protocol adapter bound");
                ProtocolError::not_supported(key)
            })
    }

    /// Find the adapter for `device`.
    ///
    /// The device's own protocol tag wins when its adapter supports the device;
    /// otherwise the first adapter (in tag order) that supports it is used.
    ///
    /// # Errors
    ///
    /// `DeviceNotSupported` (with the device attached) if no adapter fits.
    pub fn resolve_for_device(&self, device: &Device) -> Result<Arc<dyn ProtocolAdapter>> {
        if let Ok(adapter) = self.resolve(&device.protocol)
            && adapter.supports_device(device)
        {
            return Ok(adapter);
        }

        let mut candidates: Vec<(String, Arc<dyn ProtocolAdapter>)> = self
            .adapters
            .iter()
            .filter(|entry| entry.value().supports_device(device))
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        match candidates.into_iter().next() {
            Some((tag, adapter)) => {
                debug!(device_id = %device.id, tag = %tag, "Adapter selected by capability scan");
                Ok(adapter)
            }
            None => {
                warn!(
                    device_id = %device.id,
                    protocol = %device.protocol,
                    device_type = %device.device_type,
                    "No protocol adapter supports device"
                );
                Err(ProtocolError::not_supported(&device.protocol)
                    .with_device(device.id.as_str()))
            }
        }
    }

    /// Registered tags, sorted.
    pub fn list_registered(&self) -> BTreeSet<String> {
        self.adapters.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Descriptor of every registered adapter, by tag.
    pub fn descriptors(&self) -> Vec<(String, AdapterDescriptor)> {
        let mut descriptors: Vec<_> = self
            .adapters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().capabilities()))
            .collect();
        descriptors.sort_by(|a, b| a.0.cmp(&b.0));
        descriptors
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.adapters.contains_key(&normalize(tag))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("tags", &self.list_registered())
            .finish()
    }
}

/// Builder collecting the fixed start-up adapter set.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fleetlink_adapter::AdapterRegistry;
/// use fleetlink_adapter::mock::MockAdapter;
/// use fleetlink_core::DeviceType;
///
/// let (zk, _) = MockAdapter::new("ZKTECO", DeviceType::Access);
/// let (hik, _) = MockAdapter::new("HIKVISION", DeviceType::Video);
///
/// let registry = AdapterRegistry::builder()
///     .adapter("ZKTECO", Arc::new(zk))
///     .adapter("HIKVISION", Arc::new(hik))
///     .build();
///
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Default)]
pub struct AdapterRegistryBuilder {
    bindings: Vec<(String, Arc<dyn ProtocolAdapter>)>,
}

impl AdapterRegistryBuilder {
    #[must_use]
    pub fn adapter(mut self, tag: impl Into<String>, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.bindings.push((tag.into(), adapter));
        self
    }

    pub fn build(self) -> AdapterRegistry {
        let registry = AdapterRegistry::new();
        for (tag, adapter) in self.bindings {
            registry.register(&tag, adapter);
        }
        info!(count = registry.len(), "Adapter registry initialized");
        registry
    }
}
