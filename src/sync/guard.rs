//! Timeout and error-wrapping helpers for remote calls
//!
//! Every remote call gets a bounded worst-case latency ([`with_timeout`]) and
//! a uniform "no result" failure shape ([`guarded_operation`]).

use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

use crate::adapter::AdapterError;

/// Race `op` against a timer
///
/// On expiry `op` is dropped, so its eventual result is ignored, and
/// `AdapterError::Timeout` is returned for `label`.
pub async fn with_timeout<T, F>(op: F, duration: Duration, label: &str) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    match tokio::time::timeout(duration, op).await {
        Ok(result) => result,
        Err(_elapsed) => Err(AdapterError::Timeout {
            operation: label.to_string(),
            after: duration,
        }),
    }
}

/// Run `op`, turning every failure into `None`
///
/// Aborts (the caller went away) are logged at debug level; anything else is
/// logged as an error. Nothing is propagated: callers treat `None` as "could
/// not complete" and pick their own fallback.
pub async fn guarded_operation<T, F>(label: &str, op: F) -> Option<T>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    match op.await {
        Ok(value) => Some(value),
        Err(e) if e.is_benign() => {
            debug!(operation = %label, "Operation aborted (caller went away)");
            None
        }
        Err(e) => {
            error!(operation = %label, error = %e, "Remote operation failed");
            None
        }
    }
}

/// `with_timeout` inside `guarded_operation`, the shape every remote call uses
pub async fn guarded_with_timeout<T, F>(op: F, duration: Duration, label: &str) -> Option<T>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    guarded_operation(label, with_timeout(op, duration, label)).await
}
