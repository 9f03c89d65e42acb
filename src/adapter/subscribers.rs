//! Change-listener registry shared by the bundled stores

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::{Record, Subscription};

struct Listener {
    collection: String,
    sink: UnboundedSender<Record>,
}

#[derive(Default)]
pub(super) struct Subscribers {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Listener>>,
}

impl Subscribers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a listener; the returned handle removes it again
    pub fn register(self: &Arc<Self>, collection: &str, sink: UnboundedSender<Record>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Listener {
                    collection: collection.to_string(),
                    sink,
                },
            );
        debug!(collection = %collection, listener = id, "Registered change listener");

        let registry = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry
                    .listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                debug!(listener = id, "Removed change listener");
            }
        })
    }

    /// Send `record` to every listener on `collection`, pruning closed sinks
    pub fn publish(&self, collection: &str, record: &Record) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|id, listener| {
            if listener.collection != collection {
                return true;
            }
            let delivered = listener.sink.send(record.clone()).is_ok();
            if !delivered {
                debug!(listener = *id, "Listener channel closed, dropping");
            }
            delivered
        });
    }

    pub fn count(&self, collection: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|l| l.collection == collection)
            .count()
    }
}
