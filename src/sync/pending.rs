//! Writes waiting for their remote echo

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::time::Instant;

use crate::settings::SettingsPatch;

struct PendingConfirmation {
    seq: u64,
    patch: SettingsPatch,
    issued_at: Instant,
}

/// At most one write awaits confirmation; a newer write supersedes it
#[derive(Default)]
pub(super) struct PendingTracker {
    next_seq: AtomicU64,
    current: Mutex<Option<PendingConfirmation>>,
}

impl PendingTracker {
    pub fn register(&self, patch: SettingsPatch) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        *self.lock() = Some(PendingConfirmation {
            seq,
            patch,
            issued_at: Instant::now(),
        });
        seq
    }

    /// Drop `seq` if it is still the pending write
    pub fn discard(&self, seq: u64) -> bool {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|p| p.seq == seq) {
            *current = None;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self, seq: u64) -> bool {
        self.lock().as_ref().is_some_and(|p| p.seq == seq)
    }

    /// Clear the pending write if `echo` carries all of its values.
    /// Returns the confirmed sequence number and how long confirmation took.
    pub fn confirm_with(&self, echo: &SettingsPatch) -> Option<(u64, std::time::Duration)> {
        let mut current = self.lock();
        let confirmed = current.as_ref().is_some_and(|p| p.patch.is_covered_by(echo));
        if !confirmed {
            return None;
        }
        current
            .take()
            .map(|p| (p.seq, p.issued_at.elapsed()))
    }

    /// Lay the unconfirmed write over `inbound` so an older remote record
    /// cannot revert it. Returns false when nothing is pending.
    pub fn shield(&self, inbound: &mut SettingsPatch) -> bool {
        match self.lock().as_ref() {
            Some(pending) => {
                inbound.overlay(&pending.patch);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<PendingConfirmation>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(text: &str) -> SettingsPatch {
        SettingsPatch {
            hero_heading: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_echo_confirms() {
        let tracker = PendingTracker::default();
        let seq = tracker.register(heading("X"));

        assert!(tracker.confirm_with(&heading("old")).is_none());
        assert!(tracker.is_pending(seq));

        let (confirmed, _) = tracker.confirm_with(&heading("X")).unwrap();
        assert_eq!(confirmed, seq);
        assert!(!tracker.is_pending(seq));
    }

    #[test]
    fn test_shield_keeps_pending_values() {
        let tracker = PendingTracker::default();
        let mut stale = heading("old");
        assert!(!tracker.shield(&mut stale));
        assert_eq!(stale.hero_heading.as_deref(), Some("old"));

        let seq = tracker.register(heading("new"));
        assert!(tracker.shield(&mut stale));
        assert_eq!(stale.hero_heading.as_deref(), Some("new"));

        tracker.discard(seq);
        let mut later = heading("later");
        assert!(!tracker.shield(&mut later));
        assert_eq!(later.hero_heading.as_deref(), Some("later"));
    }

    #[test]
    fn test_newer_write_supersedes() {
        let tracker = PendingTracker::default();
        let first = tracker.register(heading("A"));
        let second = tracker.register(heading("B"));

        assert_ne!(first, second);
        assert!(!tracker.is_pending(first));
        assert!(!tracker.discard(first));
        assert!(tracker.discard(second));
    }
}
