//! Simulated vendor adapters.
//!
//! Real vendor SDKs are out of reach of this gateway, so each built-in tag is
//! served by a [`MockAdapter`] with a vendor-flavoured descriptor. The control
//! handles let tests and demos script failures.

use fleetlink_adapter::mock::{MockAdapter, MockAdapterHandle};
use fleetlink_adapter::{
    AdapterCapabilities, AdapterDescriptor, AdapterRegistry, PerformanceProfile,
    TechnicalRequirements,
};
use fleetlink_core::constants::GENERIC_MANUFACTURER;
use fleetlink_core::{DeviceType, Transport};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

struct VendorProfile {
    tag: &'static str,
    device_type: DeviceType,
    transport: Transport,
    default_port: Option<u16>,
    typical_latency_ms: u64,
    biometric: bool,
    /// Accepts devices without a manufacturer.
    generic: bool,
}

static VENDORS: [VendorProfile; 5] = [
    VendorProfile {
        tag: "ZKTECO",
        device_type: DeviceType::Access,
        transport: Transport::TcpPush,
        default_port: Some(4370),
        typical_latency_ms: 80,
        biometric: true,
        generic: false,
    },
    VendorProfile {
        tag: "HIKVISION",
        device_type: DeviceType::Video,
        transport: Transport::VendorSdk,
        default_port: Some(8000),
        typical_latency_ms: 150,
        biometric: true,
        generic: false,
    },
    VendorProfile {
        tag: "DAHUA",
        device_type: DeviceType::Video,
        transport: Transport::VendorSdk,
        default_port: Some(37777),
        typical_latency_ms: 150,
        biometric: true,
        generic: false,
    },
    VendorProfile {
        tag: "ENTROPY",
        device_type: DeviceType::Consume,
        transport: Transport::Http,
        default_port: Some(80),
        typical_latency_ms: 60,
        biometric: false,
        generic: false,
    },
    VendorProfile {
        tag: "RS485",
        device_type: DeviceType::Attendance,
        transport: Transport::Rs485,
        default_port: None,
        typical_latency_ms: 200,
        biometric: false,
        generic: true,
    },
];

/// Built-in adapter tags, in registration order.
pub fn vendor_tags() -> impl Iterator<Item = &'static str> {
    VENDORS.iter().map(|v| v.tag)
}

fn descriptor(profile: &VendorProfile) -> AdapterDescriptor {
    let mut descriptor =
        AdapterDescriptor::new(format!("{} (simulated)", profile.tag), "0.1.0", profile.device_type)
            .with_manufacturer(profile.tag)
            .with_protocol(profile.tag)
            .with_capabilities(AdapterCapabilities {
                biometric_dispatch: profile.biometric,
                batch_dispatch: true,
                max_batch_size: 500,
                ..Default::default()
            })
            .with_technical(TechnicalRequirements {
                transport: profile.transport,
                default_port: profile.default_port,
                ..Default::default()
            })
            .with_performance(PerformanceProfile {
                typical_latency_ms: profile.typical_latency_ms,
                ..Default::default()
            });
    if profile.generic {
        descriptor = descriptor.with_manufacturer(GENERIC_MANUFACTURER);
    }
    descriptor.add_limitation("simulated device, no wire traffic");
    descriptor
}

/// Register one simulated adapter per built-in tag.
///
/// Returns the control handles keyed by tag.
pub fn register_simulated(registry: &AdapterRegistry) -> BTreeMap<String, MockAdapterHandle> {
    let mut handles = BTreeMap::new();

    for profile in &VENDORS {
        let mut manufacturers = vec![profile.tag];
        if profile.generic {
            manufacturers.push(GENERIC_MANUFACTURER);
        }

        let (adapter, handle) = MockAdapter::new(profile.tag, profile.device_type);
        let adapter = adapter
            .with_manufacturers(manufacturers)
            .with_descriptor(descriptor(profile));

        registry.register(profile.tag, Arc::new(adapter));
        handles.insert(profile.tag.to_string(), handle);
    }

    info!(count = handles.len(), "Simulated adapters registered");
    handles
}
