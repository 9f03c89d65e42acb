//! Persistence adapters
//!
//! The synchronizer only talks to the [`PersistenceAdapter`] trait. Two
//! in-process backends ship with the crate, one per storage layout:
//! - **document_store**: a single composite document per collection
//! - **table_store**: one `content_key`/`content_value` row per field

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

mod document_store;
mod subscribers;
mod table_store;

pub use document_store::DocumentStore;
pub use table_store::{ContentRow, TableStore};

pub use crate::settings::Record;

/// Failure shapes of a remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The caller went away before the operation finished
    #[error("{0} was aborted")]
    Aborted(String),
    /// The operation did not finish in time
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    /// Backend unreachable (network, missing table, access denied)
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Backend refused or failed the request
    #[error("backend error: {0}")]
    Backend(String),
}

impl AdapterError {
    /// Aborts are expected when callers disappear and are not worth an error log
    pub fn is_benign(&self) -> bool {
        matches!(self, AdapterError::Aborted(_))
    }
}

/// Remote store capability the synchronizer is written against
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Read the whole record; `Ok(None)` when none exists yet
    async fn get_snapshot(&self, collection: &str) -> Result<Option<Record>, AdapterError>;

    /// Write `record`, replacing only the keys listed in `merge_fields`
    async fn put_snapshot(
        &self,
        collection: &str,
        record: Record,
        merge_fields: &[String],
    ) -> Result<(), AdapterError>;

    /// Deliver the full current record to `sink` on every change, including
    /// changes made through this adapter
    async fn subscribe(
        &self,
        collection: &str,
        sink: mpsc::UnboundedSender<Record>,
    ) -> Result<Subscription, AdapterError>;
}

/// Handle to a live subscription; dropping it unsubscribes
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscription_cancels_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_cancels_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _subscription = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_only_aborts_are_benign() {
        assert!(AdapterError::Aborted("get".into()).is_benign());
        assert!(!AdapterError::Unavailable("down".into()).is_benign());
        assert!(
            !AdapterError::Timeout {
                operation: "get".into(),
                after: Duration::from_millis(5)
            }
            .is_benign()
        );
    }
}
