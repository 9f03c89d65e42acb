//! Application configuration
//!
//! Selects the persistence backend and tunes the remote timeouts. Values come
//! from `config.json` in the platform config directory, then `VATCALC_*`
//! environment variables override individual fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::{collection, config, timeouts};
use crate::settings::RecordLayout;
use crate::sync::SyncOptions;

/// Which bundled store backs the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One composite document per collection
    #[default]
    Document,
    /// One row per settings field
    Table,
}

impl BackendKind {
    pub fn layout(self) -> RecordLayout {
        match self {
            BackendKind::Document => RecordLayout::Composite,
            BackendKind::Table => RecordLayout::KeyValue,
        }
    }

    pub fn default_collection(self) -> &'static str {
        match self {
            BackendKind::Document => collection::SETTINGS_DOCUMENT,
            BackendKind::Table => collection::CONTENT_TABLE,
        }
    }

    fn store_filename(self) -> &'static str {
        match self {
            BackendKind::Document => config::DOCUMENT_STORE_FILENAME,
            BackendKind::Table => config::TABLE_STORE_FILENAME,
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(BackendKind::Document),
            "table" => Ok(BackendKind::Table),
            other => anyhow::bail!("unknown backend '{other}' (expected document or table)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Document path or table name; backend default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_read_timeout_ms() -> u64 {
    timeouts::READ_MS
}

fn default_write_timeout_ms() -> u64 {
    timeouts::WRITE_MS
}

fn default_confirm_timeout_ms() -> u64 {
    timeouts::CONFIRM_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            collection: None,
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            store_path: None,
            fallback_path: None,
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FILENAME);
        path
    }

    /// Load from the config file (defaults when missing), apply environment
    /// overrides and clamp
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::path())?;
        config.apply_overrides_from(|var| std::env::var(var).ok());
        config.validate_and_clamp();
        Ok(config)
    }

    fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: AppConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", path))?;

        info!(path = %path.display(), backend = ?config.backend, "Loaded config");
        Ok(config)
    }

    /// Apply `VATCALC_*` overrides; `lookup` resolves a variable name
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parse_ms(var: &str, raw: String) -> Option<u64> {
            raw.trim()
                .parse()
                .inspect_err(|e| warn!(var = %var, error = %e, "failed to parse env var, ignoring"))
                .ok()
        }

        if let Some(raw) = lookup("VATCALC_BACKEND") {
            match raw.parse() {
                Ok(backend) => self.backend = backend,
                Err(e) => warn!(var = "VATCALC_BACKEND", error = %e, "ignoring invalid backend"),
            }
        }
        if let Some(raw) = lookup("VATCALC_COLLECTION") {
            self.collection = Some(raw);
        }
        if let Some(ms) = lookup("VATCALC_READ_TIMEOUT_MS").and_then(|raw| parse_ms("VATCALC_READ_TIMEOUT_MS", raw)) {
            self.read_timeout_ms = ms;
        }
        if let Some(ms) = lookup("VATCALC_WRITE_TIMEOUT_MS").and_then(|raw| parse_ms("VATCALC_WRITE_TIMEOUT_MS", raw)) {
            self.write_timeout_ms = ms;
        }
        if let Some(ms) = lookup("VATCALC_CONFIRM_TIMEOUT_MS").and_then(|raw| parse_ms("VATCALC_CONFIRM_TIMEOUT_MS", raw)) {
            self.confirm_timeout_ms = ms;
        }
        if let Some(raw) = lookup("VATCALC_STORE_PATH") {
            self.store_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("VATCALC_FALLBACK_PATH") {
            self.fallback_path = Some(PathBuf::from(raw));
        }
    }

    /// Clamp the timeouts to a usable range
    pub fn validate_and_clamp(&mut self) {
        use crate::constants::validation::*;

        for (name, value) in [
            ("read_timeout_ms", &mut self.read_timeout_ms),
            ("write_timeout_ms", &mut self.write_timeout_ms),
            ("confirm_timeout_ms", &mut self.confirm_timeout_ms),
        ] {
            if *value < MIN_TIMEOUT_MS {
                warn!(field = name, value = *value, min = MIN_TIMEOUT_MS, "timeout below minimum, clamping");
                *value = MIN_TIMEOUT_MS;
            } else if *value > MAX_TIMEOUT_MS {
                warn!(field = name, value = *value, max = MAX_TIMEOUT_MS, "timeout exceeds maximum, clamping");
                *value = MAX_TIMEOUT_MS;
            }
        }

        if self.collection.as_deref().is_some_and(|c| c.trim().is_empty()) {
            warn!("empty collection name, using backend default");
            self.collection = None;
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            collection: self
                .collection
                .clone()
                .unwrap_or_else(|| self.backend.default_collection().to_string()),
            layout: self.backend.layout(),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            confirm_timeout: Duration::from_millis(self.confirm_timeout_ms),
        }
    }

    /// Backing file of the selected store
    pub fn store_file(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(config::APP_DIR);
            path.push(self.backend.store_filename());
            path
        })
    }

    pub fn fallback_file(&self) -> PathBuf {
        self.fallback_path
            .clone()
            .unwrap_or_else(crate::persistence::FallbackStore::default_path)
    }
}
