//! Site settings: the aggregate, merge-patches and their stored forms

pub mod model;
pub mod platform;
pub mod record;

pub use model::{PatchError, SettingsAggregate, SettingsField, SettingsPatch, SocialLink};
pub use platform::{SocialPlatform, UnknownPlatform};
pub use record::{normalize, Record, RecordLayout};
