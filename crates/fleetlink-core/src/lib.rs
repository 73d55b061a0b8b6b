//! Shared vocabulary for the FleetLink device communication layer.
//!
//! Everything the other crates agree on lives here: the device model, the
//! canonical [`DeviceStatus`] state set and its cached [`DeviceStatusRecord`],
//! and the [`ProtocolError`] taxonomy whose [`ErrorKind`] alone decides
//! whether a failed device call may be retried.

pub mod constants;
pub mod error;
pub mod status;
pub mod types;

pub use error::{ErrorKind, ProtocolError, Result};
pub use status::{DeviceStatus, DeviceStatusRecord};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
