//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Remote operation time limits
pub mod timeouts {
    /// Read of the remote settings snapshot (milliseconds)
    pub const READ_MS: u64 = 3000;

    /// Write of a settings patch or the initial record (milliseconds)
    pub const WRITE_MS: u64 = 5000;

    /// How long a successful write waits for its remote echo before re-reading
    pub const CONFIRM_MS: u64 = 10_000;
}

/// Default values for the settings aggregate
pub mod defaults {
    /// Website title shown until an administrator changes it
    pub const WEBSITE_TITLE: &str = "VATCalc";
}

/// Remote collection naming
pub mod collection {
    /// Document path used by the document store backend
    pub const SETTINGS_DOCUMENT: &str = "settings/website";

    /// Table name used by the row store backend
    pub const CONTENT_TABLE: &str = "vat_website";
}

/// Record metadata keys (not part of the aggregate)
pub mod record {
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Config and storage locations
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "vatcalc";

    /// Application config filename
    pub const FILENAME: &str = "config.json";

    /// Local fallback snapshot filename
    pub const FALLBACK_FILENAME: &str = "website_settings.json";

    /// Document store backing file
    pub const DOCUMENT_STORE_FILENAME: &str = "document_store.json";

    /// Row store backing file
    pub const TABLE_STORE_FILENAME: &str = "table_store.json";
}

/// Config validation bounds
pub mod validation {
    /// Smallest accepted remote timeout (milliseconds)
    pub const MIN_TIMEOUT_MS: u64 = 100;

    /// Largest accepted remote timeout (milliseconds)
    pub const MAX_TIMEOUT_MS: u64 = 60_000;
}

/// VAT calculator bounds
pub mod vat {
    /// Highest accepted VAT rate in percent (inclusive)
    pub const MAX_RATE_PERCENT: f64 = 100.0;
}
