//! Consumer-side view of the shared settings

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use crate::settings::SettingsAggregate;

/// Per-consumer liveness flag
///
/// Cleared on unmount. Only suppresses deliveries to this consumer; the
/// shared subscription is unaffected.
#[derive(Debug, Clone)]
pub struct LivenessFlag(Arc<AtomicBool>);

impl LivenessFlag {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A UI surface reading the shared settings
pub struct SettingsConsumer {
    settings: watch::Receiver<SettingsAggregate>,
    availability: watch::Receiver<bool>,
    liveness: LivenessFlag,
}

impl SettingsConsumer {
    pub(super) fn new(
        settings: watch::Receiver<SettingsAggregate>,
        availability: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            availability,
            liveness: LivenessFlag::new(),
        }
    }

    /// Current aggregate
    pub fn settings(&self) -> SettingsAggregate {
        self.settings.borrow().clone()
    }

    /// Whether the remote store is reachable (false = local-only mode)
    pub fn remote_available(&self) -> bool {
        *self.availability.borrow()
    }

    /// Wait for the next settings change
    ///
    /// Returns `None` once this consumer is unmounted or the synchronizer is
    /// gone, including when unmount happens while waiting.
    pub async fn changed(&mut self) -> Option<SettingsAggregate> {
        if !self.liveness.is_alive() {
            return None;
        }
        self.settings.changed().await.ok()?;
        if !self.liveness.is_alive() {
            return None;
        }
        Some(self.settings.borrow_and_update().clone())
    }

    /// Wait for the availability indicator to flip
    pub async fn availability_changed(&mut self) -> Option<bool> {
        if !self.liveness.is_alive() {
            return None;
        }
        self.availability.changed().await.ok()?;
        if !self.liveness.is_alive() {
            return None;
        }
        Some(*self.availability.borrow_and_update())
    }

    pub fn unmount(&self) {
        self.liveness.unmount();
    }

    pub fn is_mounted(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Handle for unmounting from elsewhere (e.g. while `changed` is pending)
    pub fn liveness(&self) -> LivenessFlag {
        self.liveness.clone()
    }
}
