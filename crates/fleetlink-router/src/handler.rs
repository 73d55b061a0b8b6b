//! Message handlers.

use crate::message::DeviceMessage;
use async_trait::async_trait;
use fleetlink_core::Result;
use std::future::Future;
use std::sync::Arc;

/// Processes one routed message.
///
/// Handlers are stored as trait objects in the router, so the async method
/// goes through `async_trait`.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &DeviceMessage) -> Result<serde_json::Value>;
}

/// Handler built from an async closure. See [`handler_fn`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(DeviceMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
{
    async fn handle(&self, message: &DeviceMessage) -> Result<serde_json::Value> {
        (self.0)(message.clone()).await
    }
}

/// Wrap an async closure as a shareable handler.
///
/// # Examples
///
/// ```
/// use fleetlink_router::{handler_fn, DeviceMessage, MessageHandler};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let echo = handler_fn(|message: DeviceMessage| async move { Ok(message.payload) });
/// let reply = echo
///     .handle(&DeviceMessage::new("ACC-01", "card_swipe", json!({"card": "0001"})))
///     .await
///     .unwrap();
/// assert_eq!(reply, json!({"card": "0001"}));
/// # }
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(DeviceMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
