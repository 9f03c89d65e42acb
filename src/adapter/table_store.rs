//! Row-based content table
//!
//! Each settings field is one row keyed by `content_key`; writes upsert on
//! that key. Listeners are not primed on subscribe; after every upsert they
//! receive all rows of the table folded into one record.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::subscribers::Subscribers;
use super::{AdapterError, PersistenceAdapter, Record, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRow {
    pub content_key: String,
    pub content_value: String,
    pub updated_at: String,
}

type Table = BTreeMap<String, ContentRow>;

pub struct TableStore {
    tables: Mutex<HashMap<String, Table>>,
    path: Option<PathBuf>,
    online: AtomicBool,
    subscribers: Arc<Subscribers>,
}

impl TableStore {
    pub fn in_memory() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            path: None,
            online: AtomicBool::new(true),
            subscribers: Subscribers::new(),
        }
    }

    /// Open a file-backed table set (`{ table: [rows] }`)
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tables = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read table store {:?}", path))?;
            let stored: HashMap<String, Vec<ContentRow>> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse table store {:?}", path))?;
            stored
                .into_iter()
                .map(|(name, rows)| {
                    let table = rows
                        .into_iter()
                        .map(|row| (row.content_key.clone(), row))
                        .collect::<Table>();
                    (name, table)
                })
                .collect()
        } else {
            HashMap::new()
        };

        info!(path = %path.display(), tables = tables.len(), "Opened table store");
        Ok(Self {
            tables: Mutex::new(tables),
            path: Some(path),
            online: AtomicBool::new(true),
            subscribers: Subscribers::new(),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Rows of `table` ordered by key
    pub fn rows(&self, table: &str) -> Vec<ContentRow> {
        self.lock()
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, table: &str) -> usize {
        self.subscribers.count(table)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Table>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self, operation: &str) -> Result<(), AdapterError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AdapterError::Unavailable(format!("table store offline during {operation}")))
        }
    }

    fn fold(table: &Table) -> Record {
        table
            .values()
            .map(|row| (row.content_key.clone(), Value::String(row.content_value.clone())))
            .collect()
    }

    fn flush(path: &Path, tables: &HashMap<String, Table>) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory {:?}", parent))?;
        }
        let stored: HashMap<&String, Vec<&ContentRow>> = tables
            .iter()
            .map(|(name, table)| (name, table.values().collect()))
            .collect();
        let json = serde_json::to_string_pretty(&stored).context("Failed to serialize table store")?;
        fs::write(path, json).with_context(|| format!("Failed to write table store {:?}", path))
    }
}

/// Column values are text; anything else is stored as its JSON encoding
fn column_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl PersistenceAdapter for TableStore {
    async fn get_snapshot(&self, table: &str) -> Result<Option<Record>, AdapterError> {
        self.ensure_online("select")?;
        Ok(self
            .lock()
            .get(table)
            .filter(|t| !t.is_empty())
            .map(Self::fold))
    }

    /// Upserts one row per listed key (every key of `record` when
    /// `merge_fields` is empty)
    async fn put_snapshot(
        &self,
        table: &str,
        record: Record,
        merge_fields: &[String],
    ) -> Result<(), AdapterError> {
        self.ensure_online("upsert")?;

        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let keys: Vec<String> = if merge_fields.is_empty() {
            record.keys().cloned().collect()
        } else {
            merge_fields.to_vec()
        };

        let folded = {
            let mut tables = self.lock();
            let rows = tables.entry(table.to_string()).or_default();
            for key in keys {
                let Some(value) = record.get(&key) else {
                    continue;
                };
                rows.insert(
                    key.clone(),
                    ContentRow {
                        content_key: key,
                        content_value: column_text(value),
                        updated_at: updated_at.clone(),
                    },
                );
            }
            let folded = Self::fold(rows);

            if let Some(path) = &self.path {
                Self::flush(path, &tables).map_err(|e| AdapterError::Backend(format!("{e:#}")))?;
            }
            folded
        };

        debug!(table = %table, rows = folded.len(), "Content rows upserted");
        self.subscribers.publish(table, &folded);
        Ok(())
    }

    async fn subscribe(
        &self,
        table: &str,
        sink: mpsc::UnboundedSender<Record>,
    ) -> Result<Subscription, AdapterError> {
        self.ensure_online("subscribe")?;
        Ok(self.subscribers.register(table, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_empty_table_is_none() {
        let store = TableStore::in_memory();
        assert_eq!(store.get_snapshot("vat_website").await, Ok(None));
    }

    #[tokio::test]
    async fn test_upsert_replaces_row_by_key() {
        let store = TableStore::in_memory();
        store
            .put_snapshot("t", record(json!({ "hero_heading": "A", "website_title": "T" })), &[])
            .await
            .unwrap();
        store
            .put_snapshot("t", record(json!({ "hero_heading": "B" })), &["hero_heading".to_string()])
            .await
            .unwrap();

        let rows = store.rows("t");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content_key, "hero_heading");
        assert_eq!(rows[0].content_value, "B");
        assert_eq!(
            store.get_snapshot("t").await.unwrap(),
            Some(record(json!({ "hero_heading": "B", "website_title": "T" })))
        );
    }

    #[tokio::test]
    async fn test_non_text_values_stored_as_json() {
        let store = TableStore::in_memory();
        store
            .put_snapshot("t", record(json!({ "maintenance_mode": true, "social_links": [] })), &[])
            .await
            .unwrap();

        let snapshot = store.get_snapshot("t").await.unwrap().unwrap();
        assert_eq!(snapshot["maintenance_mode"], json!("true"));
        assert_eq!(snapshot["social_links"], json!("[]"));
    }

    #[tokio::test]
    async fn test_subscribers_get_folded_table_after_upsert() {
        let store = TableStore::in_memory();
        store.put_snapshot("t", record(json!({ "a": "1" })), &[]).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = store.subscribe("t", tx).await.unwrap();
        // Not primed with the current table
        assert!(rx.try_recv().is_err());

        store
            .put_snapshot("t", record(json!({ "b": "2" })), &["b".to_string()])
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(record(json!({ "a": "1", "b": "2" }))));
    }

    #[tokio::test]
    async fn test_file_backed_table_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");

        let store = TableStore::open(&path).unwrap();
        store
            .put_snapshot("vat_website", record(json!({ "website_title": "A" })), &[])
            .await
            .unwrap();
        drop(store);

        let reopened = TableStore::open(&path).unwrap();
        let rows = reopened.rows("vat_website");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content_value, "A");
    }
}
