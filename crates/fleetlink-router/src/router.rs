//! Routing tables.

use crate::handler::MessageHandler;
use crate::message::DeviceMessage;
use dashmap::DashMap;
use fleetlink_core::{ProtocolError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

type HandlerTable = DashMap<String, Arc<dyn MessageHandler>>;

fn normalize(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

fn bind(table: &HandlerTable, kind: &str, key: &str, handler: Arc<dyn MessageHandler>) -> bool {
    let key = normalize(key);
    let replaced = table.insert(key.clone(), handler).is_some();
    if replaced {
        info!(table = kind, key = %key, "Handler binding replaced");
    } else {
        info!(table = kind, key = %key, "Handler registered");
    }
    replaced
}

async fn route(
    table: &HandlerTable,
    kind: &str,
    key: &str,
    message: &DeviceMessage,
) -> Result<serde_json::Value> {
    let normalized = normalize(key);
    // Clone out of the map so no shard lock is held while the handler runs.
    let handler = table
        .get(&normalized)
        .map(|entry| Arc::clone(entry.value()))
        .ok_or_else(|| {
            debug!(table = kind, key = %normalized, device_id = %message.device_id, "No handler");
            ProtocolError::not_supported(&normalized)
                .with_device(message.device_id.as_str())
                .with_operation("dispatch")
        })?;

    debug!(
        table = kind,
        key = %normalized,
        device_id = %message.device_id,
        message_type = %message.message_type,
        "Dispatching message"
    );
    handler.handle(message).await
}

/// Two routing tables: one keyed by business domain, one keyed by adapter name.
///
/// A business domain may be served by several vendors, so the tables stay
/// separate. Keys are case-insensitive and the last registration for a key
/// wins.
///
/// # Examples
///
/// ```
/// use fleetlink_router::{handler_fn, BusinessDomain, DeviceMessage, MessageRouter};
/// use fleetlink_core::ErrorKind;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let router = MessageRouter::new();
/// router.register_handler(
///     BusinessDomain::Access,
///     handler_fn(|m: DeviceMessage| async move { Ok(json!({"granted": true, "device": m.device_id})) }),
/// );
///
/// let message = DeviceMessage::new("ACC-01", "card_swipe", json!({}));
/// let reply = router.dispatch("ACCESS", &message).await.unwrap();
/// assert_eq!(reply["granted"], true);
///
/// let err = router.dispatch("PARKING", &message).await.unwrap_err();
/// assert_eq!(err.kind, ErrorKind::DeviceNotSupported);
/// # }
/// ```
#[derive(Default)]
pub struct MessageRouter {
    domains: HandlerTable,
    adapters: HandlerTable,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a business-domain key. Returns whether a binding was replaced.
    pub fn register_handler(&self, key: impl AsRef<str>, handler: Arc<dyn MessageHandler>) -> bool {
        bind(&self.domains, "domain", key.as_ref(), handler)
    }

    pub fn unregister_handler(&self, key: impl AsRef<str>) -> bool {
        self.domains.remove(&normalize(key.as_ref())).is_some()
    }

    /// Route `message` to the handler bound to `key` and return its result unchanged.
    ///
    /// # Errors
    ///
    /// `DeviceNotSupported` when nothing is bound to `key`; otherwise whatever
    /// the handler returns.
    pub async fn dispatch(
        &self,
        key: impl AsRef<str>,
        message: &DeviceMessage,
    ) -> Result<serde_json::Value> {
        route(&self.domains, "domain", key.as_ref(), message).await
    }

    /// Bind a handler to an adapter name.
    pub fn register_adapter_handler(
        &self,
        adapter: impl AsRef<str>,
        handler: Arc<dyn MessageHandler>,
    ) -> bool {
        bind(&self.adapters, "adapter", adapter.as_ref(), handler)
    }

    pub async fn dispatch_to_adapter(
        &self,
        adapter: impl AsRef<str>,
        message: &DeviceMessage,
    ) -> Result<serde_json::Value> {
        route(&self.adapters, "adapter", adapter.as_ref(), message).await
    }

    pub fn domain_keys(&self) -> BTreeSet<String> {
        self.domains.iter().map(|e| e.key().clone()).collect()
    }

    pub fn adapter_keys(&self) -> BTreeSet<String> {
        self.adapters.iter().map(|e| e.key().clone()).collect()
    }
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("domains", &self.domain_keys())
            .field("adapters", &self.adapter_keys())
            .finish()
    }
}
