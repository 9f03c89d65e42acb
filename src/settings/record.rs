//! Conversion between the aggregate and stored records
//!
//! Two storage layouts exist among the supported backends:
//! - **Composite**: one document, camelCase keys, native JSON values
//! - **KeyValue**: one entry per field, snake_case keys, every value a string
//!   (booleans and lists are JSON-encoded text)
//!
//! Reading accepts either layout regardless of which one is configured, and
//! degrades a malformed field to its default without touching the others.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

use crate::constants::defaults;
use crate::settings::model::{SettingsField, SettingsPatch, SocialLink};

/// Stored form of the settings: field name → value
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordLayout {
    #[default]
    Composite,
    KeyValue,
}

impl RecordLayout {
    /// Stored key for `field` in this layout
    pub fn key(self, field: SettingsField) -> &'static str {
        match self {
            RecordLayout::Composite => field.document_key(),
            RecordLayout::KeyValue => field.entry_key(),
        }
    }

    /// Encode the fields touched by `patch`
    pub fn denormalize(self, patch: &SettingsPatch) -> Record {
        let mut record = Record::new();

        if let Some(v) = patch.maintenance_mode {
            let value = match self {
                RecordLayout::Composite => Value::Bool(v),
                RecordLayout::KeyValue => Value::String(v.to_string()),
            };
            record.insert(self.key(SettingsField::MaintenanceMode).to_string(), value);
        }

        let text_fields = [
            (SettingsField::WebsiteTitle, &patch.website_title),
            (SettingsField::HomepageContent, &patch.homepage_content),
            (SettingsField::FooterTopContent, &patch.footer_top_content),
            (SettingsField::HeroHeading, &patch.hero_heading),
            (SettingsField::HeroDescription, &patch.hero_description),
        ];
        for (field, value) in text_fields {
            if let Some(v) = value {
                record.insert(self.key(field).to_string(), Value::String(v.clone()));
            }
        }

        if let Some(logo) = &patch.website_logo {
            let value = match (self, logo) {
                (_, Some(uri)) => Value::String(uri.clone()),
                (RecordLayout::Composite, None) => Value::Null,
                (RecordLayout::KeyValue, None) => Value::String(String::new()),
            };
            record.insert(self.key(SettingsField::WebsiteLogo).to_string(), value);
        }

        if let Some(links) = &patch.social_links {
            let encoded = Value::Array(
                links
                    .iter()
                    .filter_map(|link| serde_json::to_value(link).ok())
                    .collect(),
            );
            let value = match self {
                RecordLayout::Composite => encoded,
                RecordLayout::KeyValue => Value::String(encoded.to_string()),
            };
            record.insert(self.key(SettingsField::SocialLinks).to_string(), value);
        }

        record
    }
}

/// Decode every settings field present in `record`
///
/// Absent fields stay `None` so the caller keeps its current value.
pub fn normalize(record: &Record) -> SettingsPatch {
    let mut patch = SettingsPatch::default();

    for field in SettingsField::ALL {
        let Some(value) = lookup(record, field) else {
            continue;
        };

        match field {
            SettingsField::MaintenanceMode => patch.maintenance_mode = Some(parse_bool(field, value)),
            SettingsField::WebsiteTitle => {
                let title = parse_text(field, value);
                patch.website_title = Some(if title.is_empty() {
                    defaults::WEBSITE_TITLE.to_string()
                } else {
                    title
                });
            }
            SettingsField::WebsiteLogo => patch.website_logo = Some(parse_logo(value)),
            SettingsField::SocialLinks => patch.social_links = Some(parse_social_links(value)),
            SettingsField::HomepageContent => patch.homepage_content = Some(parse_text(field, value)),
            SettingsField::FooterTopContent => patch.footer_top_content = Some(parse_text(field, value)),
            SettingsField::HeroHeading => patch.hero_heading = Some(parse_text(field, value)),
            SettingsField::HeroDescription => patch.hero_description = Some(parse_text(field, value)),
        }
    }

    patch
}

fn lookup(record: &Record, field: SettingsField) -> Option<&Value> {
    record
        .get(field.document_key())
        .or_else(|| record.get(field.entry_key()))
}

fn parse_bool(field: SettingsField, value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => match s.trim() {
            "true" => true,
            "false" | "" => false,
            other => {
                warn!(field = field.document_key(), value = %other, "Malformed boolean, using default");
                false
            }
        },
        other => {
            warn!(field = field.document_key(), value = %other, "Malformed boolean, using default");
            false
        }
    }
}

fn parse_text(field: SettingsField, value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => {
            warn!(field = field.document_key(), value = %other, "Expected text, using default");
            String::new()
        }
    }
}

fn parse_logo(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null => None,
        other => {
            warn!(value = %other, "Malformed websiteLogo, clearing");
            None
        }
    }
}

/// Links may be stored as an array or as JSON text; anything else is `[]`.
/// Bad entries are skipped individually, and duplicate ids or platforms keep
/// only their first occurrence.
fn parse_social_links(value: &Value) -> Vec<SocialLink> {
    let decoded;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Null => return Vec::new(),
        Value::String(text) if text.trim().is_empty() => return Vec::new(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(entries)) => {
                decoded = entries;
                &decoded
            }
            Ok(_) | Err(_) => {
                warn!("Malformed socialLinks, using empty list");
                return Vec::new();
            }
        },
        _ => {
            warn!("Malformed socialLinks, using empty list");
            return Vec::new();
        }
    };

    let mut ids = HashSet::new();
    let mut platforms = HashSet::new();
    let mut links = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<SocialLink>(entry.clone()) {
            Ok(link) => {
                if !platforms.insert(link.platform) || !ids.insert(link.id.clone()) {
                    warn!(id = %link.id, platform = %link.platform, "Dropping duplicate social link");
                    continue;
                }
                links.push(link);
            }
            Err(e) => warn!(error = %e, "Skipping unreadable social link entry"),
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::model::SettingsAggregate;
    use crate::settings::platform::SocialPlatform;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    fn sample_settings() -> SettingsAggregate {
        SettingsAggregate {
            maintenance_mode: true,
            website_title: "Tax Tools".to_string(),
            website_logo: Some("https://cdn.example.com/logo.png".to_string()),
            social_links: vec![SocialLink {
                id: "1700000000000".to_string(),
                platform: SocialPlatform::Github,
                url: "https://github.com/vatcalc".to_string(),
                added_at: "2024-01-01T00:00:00.000Z".to_string(),
            }],
            homepage_content: "<p>Hello</p>".to_string(),
            footer_top_content: "<p>Footer</p>".to_string(),
            hero_heading: "VAT made simple".to_string(),
            hero_description: "Add or remove VAT".to_string(),
        }
    }

    #[test]
    fn test_malformed_social_links_isolated() {
        let stored = record(json!({
            "websiteTitle": "My Site",
            "socialLinks": "not-json",
        }));

        let patch = normalize(&stored);
        assert_eq!(patch.social_links, Some(Vec::new()));
        assert_eq!(patch.website_title.as_deref(), Some("My Site"));
    }

    #[test]
    fn test_missing_fields_stay_unset() {
        let patch = normalize(&record(json!({ "heroHeading": "X" })));
        assert_eq!(patch.hero_heading.as_deref(), Some("X"));
        assert_eq!(patch.fields(), vec![SettingsField::HeroHeading]);
    }

    #[test]
    fn test_composite_layout_encoding() {
        let settings = sample_settings();
        let stored = RecordLayout::Composite.denormalize(&SettingsPatch::full(&settings));

        assert_eq!(stored["maintenanceMode"], json!(true));
        assert_eq!(stored["websiteTitle"], json!("Tax Tools"));
        assert_eq!(stored["socialLinks"][0]["platform"], json!("github"));
        assert_eq!(stored["socialLinks"][0]["addedAt"], json!("2024-01-01T00:00:00.000Z"));

        let mut restored = SettingsAggregate::default();
        restored.apply(&normalize(&stored));
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_key_value_layout_encodes_strings() {
        let settings = sample_settings();
        let stored = RecordLayout::KeyValue.denormalize(&SettingsPatch::full(&settings));

        assert!(stored.values().all(Value::is_string));
        assert_eq!(stored["maintenance_mode"], json!("true"));
        assert!(stored.contains_key("footer_top_content"));

        let mut restored = SettingsAggregate::default();
        restored.apply(&normalize(&stored));
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_key_value_cleared_logo_is_empty_string() {
        let patch = SettingsPatch {
            website_logo: Some(None),
            ..Default::default()
        };
        let stored = RecordLayout::KeyValue.denormalize(&patch);
        assert_eq!(stored["website_logo"], json!(""));
        assert_eq!(normalize(&stored).website_logo, Some(None));

        let stored = RecordLayout::Composite.denormalize(&patch);
        assert_eq!(stored["websiteLogo"], Value::Null);
    }

    #[test]
    fn test_wrong_types_degrade_to_defaults() {
        let patch = normalize(&record(json!({
            "maintenanceMode": "maybe",
            "websiteTitle": 42,
            "heroHeading": ["not", "text"],
            "websiteLogo": false,
            "heroDescription": "still fine",
        })));

        assert_eq!(patch.maintenance_mode, Some(false));
        assert_eq!(patch.website_title.as_deref(), Some("VATCalc"));
        assert_eq!(patch.hero_heading.as_deref(), Some(""));
        assert_eq!(patch.website_logo, Some(None));
        assert_eq!(patch.hero_description.as_deref(), Some("still fine"));
    }

    #[test]
    fn test_bad_social_link_entries_skipped() {
        let patch = normalize(&record(json!({
            "socialLinks": [
                { "id": "1", "platform": "twitter", "url": "https://twitter.com/a", "addedAt": "t" },
                { "id": "2", "platform": "myspace", "url": "https://myspace.com/a", "addedAt": "t" },
                { "id": "3", "platform": "twitter", "url": "https://twitter.com/b", "addedAt": "t" },
                { "id": "4" },
            ]
        })));

        let links = patch.social_links.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].id, "1");
    }

    #[test]
    fn test_social_links_as_json_text_in_document() {
        let patch = normalize(&record(json!({
            "socialLinks": "[{\"id\":\"9\",\"platform\":\"telegram\",\"url\":\"https://t.me/x\",\"addedAt\":\"t\"}]"
        })));
        let links = patch.social_links.unwrap();
        assert_eq!(links[0].platform, SocialPlatform::Telegram);
    }

    #[test]
    fn test_metadata_keys_ignored() {
        let patch = normalize(&record(json!({
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
        })));
        assert!(patch.is_empty());
    }
}
