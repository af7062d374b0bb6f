use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::{StoreChange, StoreSnapshot};

use super::persisted::PersistedStore;

/// The filter's view of the shared store: preferences in, blocked counter out.
///
/// Write failures are logged and swallowed; the store is best-effort.
#[derive(Clone)]
pub struct PreferenceBridge {
    store: Arc<PersistedStore>,
}

impl PreferenceBridge {
    pub fn new(store: Arc<PersistedStore>) -> Self {
        Self { store }
    }

    pub fn read(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }

    pub async fn reset_count(&self) {
        if let Err(err) = self.store.set_blocked_count(0).await {
            tracing::warn!(target: "store", error = %err, "failed to reset blocked counter");
        } else {
            tracing::info!(target: "store", "blocked counter reset to 0");
        }
    }

    /// Read-then-write. Not atomic: callers must serialize, see `CounterQueue`.
    pub async fn increment_count(&self) -> u64 {
        let next = self.store.blocked_count().await + 1;
        if let Err(err) = self.store.set_blocked_count(next).await {
            tracing::warn!(target: "store", error = %err, "failed to increment blocked counter");
        } else {
            tracing::debug!(target: "store", blocked = next, "blocked counter updated");
        }
        next
    }
}
