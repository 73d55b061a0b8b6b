//! Default values shared across the FleetLink crates.
//!
//! Durations are expressed in milliseconds or seconds as the constant name
//! says, so they can be dropped straight into configuration structs:
//!
//! ```
//! use fleetlink_core::constants::*;
//! use std::time::Duration;
//!
//! let ttl = Duration::from_secs(DEFAULT_STATUS_CACHE_TTL_SECS);
//! assert_eq!(ttl.as_secs(), 300);
//! assert!(DEFAULT_MAX_RETRIES > 0);
//! ```

// ============================================================================
// Command pipeline
// ============================================================================

/// Number of re-attempts after the first failed call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first re-attempt.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;

/// Multiplier applied to the backoff after each re-attempt.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Upper bound for a single backoff sleep.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

/// Time limit applied to an adapter call when the adapter does not declare one.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;

/// Number of recent executions kept by the in-memory execution sink.
pub const DEFAULT_EXECUTION_HISTORY: usize = 256;

// ============================================================================
// Device status coordination
// ============================================================================

/// Lifetime of a cached status record.
pub const DEFAULT_STATUS_CACHE_TTL_SECS: u64 = 300;

/// Maximum number of devices written to the record store in one call.
pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 100;

/// Key prefix for cached status records.
pub const STATUS_CACHE_PREFIX: &str = "fleetlink:device:status:";

/// Pub/sub channel receiving status change events.
pub const STATUS_CHANGE_CHANNEL: &str = "fleetlink:device:status:change";

/// `eventType` field of every status change event.
pub const STATUS_CHANGE_EVENT_TYPE: &str = "DEVICE_STATUS_CHANGE";

/// `source` field of status change events published by the coordinator.
pub const STATUS_CHANGE_SOURCE: &str = "DeviceStatusCoordinator";

// ============================================================================
// Heartbeat monitoring
// ============================================================================

/// Silence after which an online device is considered offline.
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 300;

/// Interval between heartbeat sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Adapter matching
// ============================================================================

/// Manufacturer tag matched by devices that do not declare a manufacturer.
pub const GENERIC_MANUFACTURER: &str = "GENERIC";
