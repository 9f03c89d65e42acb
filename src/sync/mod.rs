//! Settings synchronizer
//!
//! Single source of truth for the site settings. Construct one
//! [`SettingsSynchronizer`] at startup and hand clones of it to every
//! consumer; all clones share one aggregate and at most one remote
//! subscription.
//!
//! Lifecycle:
//! 1. `initialize()` merges the local fallback, reads the remote snapshot
//!    (creating it if missing) and opens the real-time subscription
//! 2. `save()` applies a patch optimistically, then writes it remotely, or to
//!    the local fallback when the remote store fails
//! 3. remote changes are merged as they arrive
//! 4. `teardown()` at process shutdown closes the subscription

mod consumer;
pub mod guard;
mod pending;

pub use consumer::{LivenessFlag, SettingsConsumer};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapter::{PersistenceAdapter, Record, Subscription};
use crate::constants::{collection, record, timeouts};
use crate::error::SyncError;
use crate::persistence::FallbackStore;
use crate::settings::{
    normalize, RecordLayout, SettingsAggregate, SettingsField, SettingsPatch, SocialLink,
    SocialPlatform,
};
use guard::{guarded_with_timeout, with_timeout};
use pending::PendingTracker;

/// Where and how the settings are stored remotely
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub collection: String,
    pub layout: RecordLayout,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Wait for a write's echo before re-reading the remote snapshot
    pub confirm_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            collection: collection::SETTINGS_DOCUMENT.to_string(),
            layout: RecordLayout::Composite,
            read_timeout: Duration::from_millis(timeouts::READ_MS),
            write_timeout: Duration::from_millis(timeouts::WRITE_MS),
            confirm_timeout: Duration::from_millis(timeouts::CONFIRM_MS),
        }
    }
}

/// Where a successful save ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Remote,
    LocalOnly,
}

struct LiveSubscription {
    handle: Subscription,
    pump: JoinHandle<()>,
}

struct Inner {
    adapter: Arc<dyn PersistenceAdapter>,
    fallback: FallbackStore,
    options: SyncOptions,
    settings: watch::Sender<SettingsAggregate>,
    remote_available: watch::Sender<bool>,
    /// Only writer path for subscription setup
    subscription: Mutex<Option<LiveSubscription>>,
    subscribed: AtomicBool,
    fallback_loaded: AtomicBool,
    saving: AtomicBool,
    pending: PendingTracker,
    alive: AtomicBool,
}

/// Clears the in-flight flag when the save finishes or is dropped
struct SaveGuard<'a>(&'a AtomicBool);

impl<'a> SaveGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SaveGuard(flag))
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct SettingsSynchronizer {
    inner: Arc<Inner>,
}

impl SettingsSynchronizer {
    pub fn new(
        adapter: Arc<dyn PersistenceAdapter>,
        fallback: FallbackStore,
        options: SyncOptions,
    ) -> Self {
        let (settings, _) = watch::channel(SettingsAggregate::default());
        let (remote_available, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                adapter,
                fallback,
                options,
                settings,
                remote_available,
                subscription: Mutex::new(None),
                subscribed: AtomicBool::new(false),
                fallback_loaded: AtomicBool::new(false),
                saving: AtomicBool::new(false),
                pending: PendingTracker::default(),
                alive: AtomicBool::new(true),
            }),
        }
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Bring the shared state up; safe to call from every consumer
    ///
    /// Returns immediately when the subscription already exists. Otherwise
    /// hydrates from the local fallback, then from the remote store, and opens
    /// the subscription. Concurrent callers wait for the first one to finish.
    /// Remote failures never raise: the result is `false` and the process
    /// keeps running from local state until the next `initialize()`/`save()`.
    pub async fn initialize(&self) -> bool {
        let mut slot = self.inner.subscription.lock().await;
        if slot.is_some() {
            debug!("Settings subscription already live, attaching to existing state");
            return true;
        }
        if !self.inner.alive.load(Ordering::SeqCst) {
            warn!("Ignoring initialize() after teardown");
            return false;
        }

        self.hydrate_from_fallback();

        match self.connect_remote().await {
            Some(live) => {
                *slot = Some(live);
                self.inner.subscribed.store(true, Ordering::SeqCst);
                self.set_remote_available(true);
                info!(collection = %self.inner.options.collection, "Settings synchronized with remote store");
                true
            }
            None => {
                self.set_remote_available(false);
                warn!(collection = %self.inner.options.collection, "Remote settings unavailable, using local fallback");
                false
            }
        }
    }

    /// Initialize (if needed) and attach a new consumer
    pub async fn mount(&self) -> SettingsConsumer {
        self.initialize().await;
        self.attach()
    }

    /// New consumer over the shared state; never touches the remote store
    pub fn attach(&self) -> SettingsConsumer {
        SettingsConsumer::new(
            self.inner.settings.subscribe(),
            self.inner.remote_available.subscribe(),
        )
    }

    /// Process shutdown: close the subscription and stop applying changes.
    /// Consumers unmounting individually must not call this.
    pub async fn teardown(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        let live = self.inner.subscription.lock().await.take();
        self.inner.subscribed.store(false, Ordering::SeqCst);

        if let Some(live) = live {
            live.handle.unsubscribe();
            live.pump.abort();
            info!("Settings subscription closed");
        }
    }

    fn hydrate_from_fallback(&self) {
        if self.inner.fallback_loaded.swap(true, Ordering::SeqCst) {
            return;
        }
        let patch = self.inner.fallback.load_fallback();
        if !patch.is_empty() {
            self.merge(&patch);
        }
    }

    async fn connect_remote(&self) -> Option<LiveSubscription> {
        let options = &self.inner.options;
        let collection = options.collection.as_str();

        let snapshot = guarded_with_timeout(
            self.inner.adapter.get_snapshot(collection),
            options.read_timeout,
            "Get settings snapshot",
        )
        .await?;

        match snapshot {
            Some(stored) => {
                let patch = normalize(&stored);
                self.merge(&patch);
                debug!(fields = patch.fields().len(), "Hydrated settings from remote snapshot");
            }
            None => {
                info!(collection = %collection, "No remote settings record, creating initial record");
                let (stored, _) = self.encode(&SettingsPatch::full(&self.read()), record::CREATED_AT);
                guarded_with_timeout(
                    self.inner.adapter.put_snapshot(collection, stored, &[]),
                    options.write_timeout,
                    "Create initial settings record",
                )
                .await?;
            }
        }

        self.open_subscription().await
    }

    async fn open_subscription(&self) -> Option<LiveSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = guarded_with_timeout(
            self.inner.adapter.subscribe(&self.inner.options.collection, tx),
            self.inner.options.read_timeout,
            "Subscribe to settings",
        )
        .await?;

        let pump = spawn_pump(Arc::downgrade(&self.inner), rx);
        Some(LiveSubscription { handle, pump })
    }

    /// Reopen the subscription after the remote store came back
    async fn resume_subscription(&self) {
        let Ok(mut slot) = self.inner.subscription.try_lock() else {
            // initialize() or teardown() owns it right now
            return;
        };
        if slot.is_some() || !self.inner.alive.load(Ordering::SeqCst) {
            return;
        }
        if let Some(live) = self.open_subscription().await {
            *slot = Some(live);
            self.inner.subscribed.store(true, Ordering::SeqCst);
            info!("Settings subscription resumed");
        }
    }

    // ==========================================================================
    // Reads
    // ==========================================================================

    /// Current aggregate, including optimistic writes not yet confirmed
    pub fn read(&self) -> SettingsAggregate {
        self.inner.settings.borrow().clone()
    }

    pub fn remote_available(&self) -> bool {
        *self.inner.remote_available.borrow()
    }

    pub fn is_saving(&self) -> bool {
        self.inner.saving.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.subscribed.load(Ordering::SeqCst)
    }

    // ==========================================================================
    // Remote changes
    // ==========================================================================

    /// Merge a pushed record and notify consumers
    ///
    /// Fields missing from `record` keep their in-memory value. Returns true if
    /// the aggregate changed; ignored entirely after teardown.
    pub fn on_remote_change(&self, record: &Record) -> bool {
        if !self.inner.alive.load(Ordering::SeqCst) {
            debug!("Ignoring remote change after teardown");
            return false;
        }

        let mut patch = normalize(record);
        if let Some((seq, after)) = self.inner.pending.confirm_with(&patch) {
            debug!(seq, elapsed = ?after, "Remote echo confirmed saved settings");
        } else if self.inner.pending.shield(&mut patch) {
            debug!("Remote change predates the pending write, keeping local values");
        }
        let changed = self.merge(&patch);
        debug!(fields = patch.fields().len(), changed, "Applied remote settings change");
        changed
    }

    /// Re-read the remote snapshot and merge it (remote wins, except over a
    /// write still awaiting its echo)
    pub async fn reconcile(&self) -> bool {
        let snapshot = guarded_with_timeout(
            self.inner.adapter.get_snapshot(&self.inner.options.collection),
            self.inner.options.read_timeout,
            "Reconcile settings",
        )
        .await;

        match snapshot {
            Some(Some(stored)) => {
                self.set_remote_available(true);
                let mut patch = normalize(&stored);
                if self.inner.pending.confirm_with(&patch).is_none() {
                    self.inner.pending.shield(&mut patch);
                }
                let changed = self.merge(&patch);
                info!(changed, "Reconciled settings with remote snapshot");
                changed
            }
            Some(None) => {
                warn!("Remote settings record missing during reconcile");
                false
            }
            None => {
                self.set_remote_available(false);
                false
            }
        }
    }

    // ==========================================================================
    // Writes
    // ==========================================================================

    /// Apply `patch` now, then persist it
    ///
    /// A second call while one is in flight fails with
    /// [`SyncError::SaveInProgress`] and changes nothing. A remote failure
    /// falls back to the local snapshot (`SaveOutcome::LocalOnly`); only a
    /// failure of both stores is an error, and even then the in-memory
    /// aggregate keeps the patch.
    pub async fn save(&self, patch: SettingsPatch) -> Result<SaveOutcome, SyncError> {
        patch.validate()?;
        let Some(_in_flight) = SaveGuard::acquire(&self.inner.saving) else {
            warn!("Save operation already in progress");
            return Err(SyncError::SaveInProgress);
        };

        self.merge(&patch);
        let snapshot = self.read();

        let (stored, merge_fields) = self.encode(&patch, record::UPDATED_AT);
        let seq = self.inner.pending.register(patch.clone());
        let written = with_timeout(
            self.inner
                .adapter
                .put_snapshot(&self.inner.options.collection, stored, &merge_fields),
            self.inner.options.write_timeout,
            "Save settings",
        )
        .await;

        match written {
            Ok(()) => {
                self.set_remote_available(true);
                self.inner.fallback.store_best_effort(&snapshot);
                self.watch_for_echo(seq);
                self.resume_subscription().await;
                info!(fields = ?field_names(&patch), "Saved settings to remote store");
                Ok(SaveOutcome::Remote)
            }
            Err(remote) => {
                self.inner.pending.discard(seq);
                if remote.is_benign() {
                    debug!("Remote save aborted, keeping change locally");
                } else {
                    warn!(error = %remote, "Remote save failed, falling back to local storage");
                }

                self.set_remote_available(false);
                if let Err(local) = self.inner.fallback.store_fallback(&snapshot) {
                    error!(remote = %remote, local = ?local, "Fallback save also failed");
                    return Err(SyncError::Persist {
                        remote: remote.to_string(),
                        local: local.into(),
                    });
                }
                Ok(SaveOutcome::LocalOnly)
            }
        }
    }

    pub async fn toggle_maintenance_mode(&self) -> Result<SaveOutcome, SyncError> {
        let next = !self.read().maintenance_mode;
        self.save(SettingsPatch {
            maintenance_mode: Some(next),
            ..Default::default()
        })
        .await
    }

    pub async fn update_website_title(&self, title: &str) -> Result<SaveOutcome, SyncError> {
        self.save(SettingsPatch {
            website_title: Some(title.trim().to_string()),
            ..Default::default()
        })
        .await
    }

    /// Set the logo from a data URI or remote URL
    pub async fn update_website_logo(&self, logo: &str) -> Result<SaveOutcome, SyncError> {
        let logo = logo.trim();
        self.save(SettingsPatch {
            website_logo: Some((!logo.is_empty()).then(|| logo.to_string())),
            ..Default::default()
        })
        .await
    }

    pub async fn delete_website_logo(&self) -> Result<SaveOutcome, SyncError> {
        self.save(SettingsPatch {
            website_logo: Some(None),
            ..Default::default()
        })
        .await
    }

    pub async fn update_hero(&self, heading: &str, description: &str) -> Result<SaveOutcome, SyncError> {
        self.save(SettingsPatch {
            hero_heading: Some(heading.to_string()),
            hero_description: Some(description.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Back to the built-in hero text
    pub async fn reset_hero(&self) -> Result<SaveOutcome, SyncError> {
        self.update_hero("", "").await
    }

    /// Append a link for `platform`; one link per platform
    pub async fn add_social_link(
        &self,
        platform: SocialPlatform,
        url: &str,
    ) -> Result<(SocialLink, SaveOutcome), SyncError> {
        if url.trim().is_empty() {
            return Err(SyncError::EmptyUrl);
        }
        let mut links = self.read().social_links;
        if links.iter().any(|l| l.platform == platform) {
            return Err(SyncError::PlatformAlreadyAdded(platform));
        }

        let mut link = SocialLink::new(platform, url);
        // Millisecond ids can collide when links are added in quick succession
        while links.iter().any(|l| l.id == link.id) {
            let bumped = link.id.parse::<i64>().map(|n| n + 1).unwrap_or_default();
            link.id = bumped.to_string();
        }
        links.push(link.clone());

        let outcome = self
            .save(SettingsPatch {
                social_links: Some(links),
                ..Default::default()
            })
            .await?;
        Ok((link, outcome))
    }

    pub async fn remove_social_link(&self, id: &str) -> Result<SaveOutcome, SyncError> {
        let mut links = self.read().social_links;
        let before = links.len();
        links.retain(|l| l.id != id);
        if links.len() == before {
            return Err(SyncError::UnknownLink(id.to_string()));
        }

        self.save(SettingsPatch {
            social_links: Some(links),
            ..Default::default()
        })
        .await
    }

    // ==========================================================================
    // Internals
    // ==========================================================================

    fn merge(&self, patch: &SettingsPatch) -> bool {
        self.inner.settings.send_if_modified(|settings| settings.apply(patch))
    }

    fn set_remote_available(&self, available: bool) {
        self.inner.remote_available.send_if_modified(|current| {
            if *current == available {
                return false;
            }
            *current = available;
            true
        });
    }

    /// Stored form of `patch` plus a timestamp under `stamp_key` (composite
    /// layout only), and the keys the write should merge
    fn encode(&self, patch: &SettingsPatch, stamp_key: &str) -> (Record, Vec<String>) {
        let layout = self.inner.options.layout;
        let mut stored = layout.denormalize(patch);
        if layout == RecordLayout::Composite {
            stored.insert(
                stamp_key.to_string(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        let merge_fields = stored.keys().cloned().collect();
        (stored, merge_fields)
    }

    /// Re-read the remote snapshot if write `seq` is not echoed in time
    fn watch_for_echo(&self, seq: u64) {
        if !self.inner.pending.is_pending(seq) {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let wait = self.inner.options.confirm_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.alive.load(Ordering::SeqCst) || !inner.pending.discard(seq) {
                return;
            }
            warn!(seq, waited = ?wait, "No remote echo for saved settings, re-reading snapshot");
            SettingsSynchronizer { inner }.reconcile().await;
        });
    }
}

/// Forward pushed records into the synchronizer, in receipt order
fn spawn_pump(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Record>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(pushed) = rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            SettingsSynchronizer { inner }.on_remote_change(&pushed);
        }
        debug!("Settings change stream closed");
    })
}

fn field_names(patch: &SettingsPatch) -> Vec<&'static str> {
    patch
        .fields()
        .into_iter()
        .map(SettingsField::document_key)
        .collect()
}
