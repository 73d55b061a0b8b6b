//! Message routing for FleetLink.
//!
//! Inbound device traffic is dispatched to business handlers by domain key
//! (`ACCESS`, `ATTENDANCE`, `CONSUME`). A second table keyed by adapter name
//! serves adapter-level dispatch.

pub mod handler;
pub mod message;
pub mod router;

pub use handler::{FnHandler, MessageHandler, handler_fn};
pub use message::{BusinessDomain, DeviceMessage};
pub use router::MessageRouter;
