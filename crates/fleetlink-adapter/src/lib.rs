//! Protocol adapter layer for FleetLink.
//!
//! Every device vendor or wire protocol is integrated through one
//! [`ProtocolAdapter`] implementation. Callers never talk to a vendor SDK
//! directly: they resolve an adapter by tag from the [`AdapterRegistry`] and
//! invoke it through the command pipeline.
//!
//! # Design
//!
//! - **Object-safe**: adapters are stored as `Arc<dyn ProtocolAdapter>` so new
//!   vendors can be registered at start-up without touching callers.
//! - **Stateless towards the core**: adapters report outcomes by returning
//!   them; they never update device status themselves.
//! - **Self-describing**: [`ProtocolAdapter::capabilities`] returns an
//!   [`AdapterDescriptor`] used for discovery and diagnostics, never for
//!   dispatch decisions.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use fleetlink_adapter::{AdapterRegistry, ProtocolAdapter};
//! use fleetlink_adapter::mock::MockAdapter;
//! use fleetlink_core::DeviceType;
//!
//! let (adapter, _handle) = MockAdapter::new("ZKTECO", DeviceType::Access);
//! let registry = AdapterRegistry::new();
//! registry.register("ZKTECO", Arc::new(adapter));
//!
//! let resolved = registry.resolve("zkteco").unwrap();
//! assert_eq!(resolved.name(), "ZKTECO");
//! assert!(registry.resolve("DAHUA").is_err());
//! ```

pub mod descriptor;
pub mod mock;
pub mod registry;
pub mod traits;
pub mod types;

pub use descriptor::{
    AdapterCapabilities, AdapterDescriptor, PerformanceProfile, TechnicalRequirements,
};
pub use registry::{AdapterRegistry, AdapterRegistryBuilder};
pub use traits::ProtocolAdapter;
pub use types::{
    BiometricKind, BiometricTemplate, ConfigPayload, ConnectionTestResult, DeviceStatusReport,
    DispatchResult, ItemFailure, PersonRecord,
};
