//! Connectivity signal.
//!
//! Process-wide online/offline state backed by a `tokio::sync::watch`
//! channel. Clones share the same signal, so the host can flip it from
//! wherever it learns about reachability while the engine observes it.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared online/offline flag with change notification.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    /// Creates a signal with the given initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Shorthand for `Connectivity::new(true)`.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Shorthand for `Connectivity::new(false)`.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Updates the state. Subscribers are only notified on an actual change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}
