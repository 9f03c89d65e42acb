//! Composite-layout document store
//!
//! Keeps one JSON document per collection. With a backing file every write is
//! flushed to disk so the store survives restarts; without one it lives only
//! for the process. Listeners receive the current document right after
//! subscribing and again after every write.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::subscribers::Subscribers;
use super::{AdapterError, PersistenceAdapter, Record, Subscription};

pub struct DocumentStore {
    documents: Mutex<HashMap<String, Record>>,
    path: Option<PathBuf>,
    online: AtomicBool,
    subscribers: Arc<Subscribers>,
}

impl DocumentStore {
    pub fn in_memory() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            path: None,
            online: AtomicBool::new(true),
            subscribers: Subscribers::new(),
        }
    }

    /// Open a file-backed store, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let documents = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read document store {:?}", path))?;
            serde_json::from_str::<HashMap<String, Record>>(&contents)
                .with_context(|| format!("Failed to parse document store {:?}", path))?
        } else {
            HashMap::new()
        };

        info!(path = %path.display(), documents = documents.len(), "Opened document store");
        Ok(Self {
            documents: Mutex::new(documents),
            path: Some(path),
            online: AtomicBool::new(true),
            subscribers: Subscribers::new(),
        })
    }

    /// Simulate losing (or regaining) the connection
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Current document, bypassing the adapter interface
    pub fn document(&self, collection: &str) -> Option<Record> {
        self.lock().get(collection).cloned()
    }

    pub fn listener_count(&self, collection: &str) -> usize {
        self.subscribers.count(collection)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Record>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self, operation: &str) -> Result<(), AdapterError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AdapterError::Unavailable(format!("document store offline during {operation}")))
        }
    }

    fn flush(path: &Path, documents: &HashMap<String, Record>) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(documents)
            .context("Failed to serialize document store")?;
        fs::write(path, json).with_context(|| format!("Failed to write document store {:?}", path))
    }
}

#[async_trait]
impl PersistenceAdapter for DocumentStore {
    async fn get_snapshot(&self, collection: &str) -> Result<Option<Record>, AdapterError> {
        self.ensure_online("get")?;
        Ok(self.document(collection))
    }

    /// An empty `merge_fields` replaces the whole document. Otherwise each
    /// listed key is copied from `record`, or removed when `record` lacks it.
    async fn put_snapshot(
        &self,
        collection: &str,
        record: Record,
        merge_fields: &[String],
    ) -> Result<(), AdapterError> {
        self.ensure_online("put")?;

        let updated = {
            let mut documents = self.lock();
            let document = documents.entry(collection.to_string()).or_default();
            if merge_fields.is_empty() {
                *document = record;
            } else {
                for key in merge_fields {
                    match record.get(key) {
                        Some(value) => {
                            document.insert(key.clone(), value.clone());
                        }
                        None => {
                            document.remove(key);
                        }
                    }
                }
            }
            let updated = document.clone();

            if let Some(path) = &self.path {
                Self::flush(path, &documents).map_err(|e| AdapterError::Backend(format!("{e:#}")))?;
            }
            updated
        };

        debug!(collection = %collection, fields = merge_fields.len(), "Document written");
        self.subscribers.publish(collection, &updated);
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: &str,
        sink: mpsc::UnboundedSender<Record>,
    ) -> Result<Subscription, AdapterError> {
        self.ensure_online("subscribe")?;

        if let Some(current) = self.document(collection)
            && sink.send(current).is_err()
        {
            debug!(collection = %collection, "Listener channel closed before priming");
        }
        Ok(self.subscribers.register(collection, sink))
    }
}
