//! Device status coordination for FleetLink.
//!
//! [`DeviceStatusCoordinator`] is the single owner of device status. It keeps
//! a cache-first view over an authoritative store, serializes updates per
//! device, and fans every effective transition out to in-process listeners
//! and to the `fleetlink:device:status:change` channel.
//!
//! Store and cache are abstract ([`DeviceRecordStore`], [`CacheSubstrate`]);
//! [`memory`] provides in-process implementations with failure injection.
//!
//! [`HeartbeatMonitor`] marks devices offline when they stop reporting.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod listener;
pub mod memory;
pub mod substrate;

pub use config::{HeartbeatConfig, StatusConfig};
pub use coordinator::{BatchUpdateReport, DeviceStatusCoordinator};
pub use error::{Result, SubstrateError};
pub use event::{StatusChange, StatusChangeEvent};
pub use heartbeat::{HeartbeatHandle, HeartbeatMonitor, SweepReport};
pub use listener::DeviceStatusListener;
pub use memory::{InMemoryCache, InMemoryStore};
pub use substrate::{CacheSubstrate, DeviceRecord, DeviceRecordStore};
