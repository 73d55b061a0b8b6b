//! Mock adapter implementations for testing and development.
//!
//! The mock adapter behaves like a well-mannered device: it stores pushed
//! persons in memory and answers queries from that table. A paired handle
//! scripts failures and latency so callers can exercise retry, timeout and
//! status transitions without real hardware.

pub mod adapter;

pub use adapter::{MockAdapter, MockAdapterHandle};
