//! In-process status listeners.

use crate::event::StatusChange;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};
use tracing::{error, info};

/// Callback invoked on every effective status change.
///
/// Called synchronously while the device's update is in progress, so keep it
/// short. Errors and panics are logged and never reach the caller or other
/// listeners.
pub trait DeviceStatusListener: Send + Sync {
    /// Unique listener name; registering the same name again replaces it.
    fn name(&self) -> &str;

    fn on_status_changed(&self, change: &StatusChange) -> anyhow::Result<()>;
}

/// Ordered listener list.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn DeviceStatusListener>>>,
}

impl ListenerSet {
    pub(crate) fn register(&self, listener: Arc<dyn DeviceStatusListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let name = listener.name().to_string();
        match listeners.iter().position(|l| l.name() == name) {
            Some(index) => listeners[index] = listener,
            None => listeners.push(listener),
        }
        info!(listener = %name, "Status listener registered");
    }

    pub(crate) fn unregister(&self, name: &str) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = listeners.len();
        listeners.retain(|l| l.name() != name);
        let removed = listeners.len() != before;
        if removed {
            info!(listener = %name, "Status listener unregistered");
        }
        removed
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|l| l.name().to_string()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn DeviceStatusListener>> {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Notify every listener in registration order.
    ///
    /// Works on a snapshot, so listeners may (un)register others while running.
    pub(crate) fn notify(&self, change: &StatusChange) {
        for listener in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_status_changed(change))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(
                    listener = %listener.name(),
                    device_id = %change.device_id,
                    error = %e,
                    "Status listener failed"
                ),
                Err(_) => error!(
                    listener = %listener.name(),
                    device_id = %change.device_id,
                    "Status listener panicked"
                ),
            }
        }
    }
}
