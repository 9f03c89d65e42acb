//! vatcalc: site-settings core for the VAT calculator website
//!
//! The public site and the admin console read one shared
//! [`SettingsAggregate`](settings::SettingsAggregate) through a
//! [`SettingsSynchronizer`](sync::SettingsSynchronizer), which keeps it in
//! step with a remote store and mirrors it to a local fallback file.

#![forbid(unsafe_code)]

pub mod adapter;
pub mod config;
pub mod constants;
pub mod error;
pub mod persistence;
pub mod settings;
pub mod sync;
pub mod vat;

pub use adapter::{AdapterError, PersistenceAdapter};
pub use error::SyncError;
pub use settings::{SettingsAggregate, SettingsPatch, SocialLink, SocialPlatform};
pub use sync::{SaveOutcome, SettingsConsumer, SettingsSynchronizer, SyncOptions};
