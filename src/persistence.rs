use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::constants::{config, record};
use crate::settings::{normalize, Record, RecordLayout, SettingsAggregate, SettingsPatch};

/// Client-local mirror of the last known settings
///
/// Read once at startup and rewritten on every save, so the site stays
/// renderable with the latest edits when the remote store is unreachable.
/// Stored as a composite JSON document.
#[derive(Debug, Clone)]
pub struct FallbackStore {
    path: PathBuf,
}

impl FallbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/vatcalc/website_settings.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FALLBACK_FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last stored snapshot as a patch; empty if nothing usable is stored
    pub fn load_fallback(&self) -> SettingsPatch {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No local fallback snapshot");
                return SettingsPatch::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read local fallback, ignoring");
                return SettingsPatch::default();
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(stored)) => {
                let patch = normalize(&stored);
                info!(path = %self.path.display(), fields = patch.fields().len(), "Loaded local fallback snapshot");
                patch
            }
            Ok(_) => {
                warn!(path = %self.path.display(), "Local fallback is not an object, ignoring");
                SettingsPatch::default()
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Error parsing fallback settings");
                SettingsPatch::default()
            }
        }
    }

    /// Write `settings` as the new snapshot
    pub fn store_fallback(&self, settings: &SettingsAggregate) -> Result<()> {
        let mut stored: Record = RecordLayout::Composite.denormalize(&SettingsPatch::full(settings));
        stored.insert(
            record::UPDATED_AT.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create fallback directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(&stored).context("Failed to serialize fallback settings")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write fallback settings to {:?}", self.path))?;

        debug!(path = %self.path.display(), "Stored local fallback snapshot");
        Ok(())
    }

    /// `store_fallback`, logging instead of returning the failure
    pub fn store_best_effort(&self, settings: &SettingsAggregate) -> bool {
        match self.store_fallback(settings) {
            Ok(()) => true,
            Err(e) => {
                error!(error = ?e, "Failed to store local fallback");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback_in(dir: &tempfile::TempDir) -> FallbackStore {
        FallbackStore::new(dir.path().join("vatcalc").join("website_settings.json"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fallback_in(&dir).load_fallback().is_empty());
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = fallback_in(&dir);

        let settings = SettingsAggregate {
            website_title: "Offline Title".to_string(),
            maintenance_mode: true,
            ..Default::default()
        };
        fallback.store_fallback(&settings).unwrap();

        let mut restored = SettingsAggregate::default();
        restored.apply(&fallback.load_fallback());
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = fallback_in(&dir);
        fs::create_dir_all(fallback.path().parent().unwrap()).unwrap();

        fs::write(fallback.path(), "{ not json").unwrap();
        assert!(fallback.load_fallback().is_empty());

        fs::write(fallback.path(), "[1, 2, 3]").unwrap();
        assert!(fallback.load_fallback().is_empty());
    }

    #[test]
    fn test_partial_snapshot_loads_present_fields() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = fallback_in(&dir);
        fs::create_dir_all(fallback.path().parent().unwrap()).unwrap();
        fs::write(fallback.path(), r#"{ "websiteTitle": "A", "socialLinks": "not-json" }"#).unwrap();

        let patch = fallback.load_fallback();
        assert_eq!(patch.website_title.as_deref(), Some("A"));
        assert_eq!(patch.social_links, Some(Vec::new()));
        assert!(patch.hero_heading.is_none());
    }

    #[test]
    fn test_store_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        // Parent "directory" is a regular file
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let fallback = FallbackStore::new(blocker.join("website_settings.json"));

        assert!(fallback.store_fallback(&SettingsAggregate::default()).is_err());
        assert!(!fallback.store_best_effort(&SettingsAggregate::default()));
    }
}
