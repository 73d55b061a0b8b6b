//! FleetLink gateway: configuration, wiring and health checks.
//!
//! The binary in `main.rs` is a thin CLI over [`Gateway`]. Everything it does
//! is available here so integration tests can drive the same code.

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod simulated;
pub mod telemetry;

pub use config::{DeviceConfig, GatewayConfig, LoggingConfig};
pub use error::{ConfigError, GatewayError, Result};
pub use gateway::{Gateway, HealthReport};
