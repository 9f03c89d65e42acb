//! Settings aggregate and merge-patch types

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::constants::defaults;
use crate::settings::platform::SocialPlatform;

/// External profile link shown in the footer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLink {
    pub id: String,
    pub platform: SocialPlatform,
    pub url: String,
    pub added_at: String,
}

impl SocialLink {
    /// New link stamped with a millisecond id and the current time
    pub fn new(platform: SocialPlatform, url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: now.timestamp_millis().to_string(),
            platform,
            url: url.trim().to_string(),
            added_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// All configurable site content
///
/// One instance lives inside the synchronizer; consumers get clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsAggregate {
    pub maintenance_mode: bool,
    pub website_title: String,
    pub website_logo: Option<String>,
    pub social_links: Vec<SocialLink>,
    pub homepage_content: String,
    pub footer_top_content: String,
    pub hero_heading: String,
    pub hero_description: String,
}

impl Default for SettingsAggregate {
    fn default() -> Self {
        Self {
            maintenance_mode: false,
            website_title: defaults::WEBSITE_TITLE.to_string(),
            website_logo: None,
            social_links: Vec::new(),
            homepage_content: String::new(),
            footer_top_content: String::new(),
            hero_heading: String::new(),
            hero_description: String::new(),
        }
    }
}

impl SettingsAggregate {
    /// Merge `patch` into the aggregate, returning true if anything changed
    pub fn apply(&mut self, patch: &SettingsPatch) -> bool {
        let before = self.clone();

        if let Some(v) = patch.maintenance_mode {
            self.maintenance_mode = v;
        }
        if let Some(v) = &patch.website_title {
            self.website_title = v.clone();
        }
        if let Some(v) = &patch.website_logo {
            self.website_logo = v.clone();
        }
        if let Some(v) = &patch.social_links {
            self.social_links = v.clone();
        }
        if let Some(v) = &patch.homepage_content {
            self.homepage_content = v.clone();
        }
        if let Some(v) = &patch.footer_top_content {
            self.footer_top_content = v.clone();
        }
        if let Some(v) = &patch.hero_heading {
            self.hero_heading = v.clone();
        }
        if let Some(v) = &patch.hero_description {
            self.hero_description = v.clone();
        }

        *self != before
    }
}

/// Addressable fields of the aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    MaintenanceMode,
    WebsiteTitle,
    WebsiteLogo,
    SocialLinks,
    HomepageContent,
    FooterTopContent,
    HeroHeading,
    HeroDescription,
}

impl SettingsField {
    pub const ALL: [SettingsField; 8] = [
        SettingsField::MaintenanceMode,
        SettingsField::WebsiteTitle,
        SettingsField::WebsiteLogo,
        SettingsField::SocialLinks,
        SettingsField::HomepageContent,
        SettingsField::FooterTopContent,
        SettingsField::HeroHeading,
        SettingsField::HeroDescription,
    ];

    /// Field name inside a composite document
    pub fn document_key(self) -> &'static str {
        match self {
            SettingsField::MaintenanceMode => "maintenanceMode",
            SettingsField::WebsiteTitle => "websiteTitle",
            SettingsField::WebsiteLogo => "websiteLogo",
            SettingsField::SocialLinks => "socialLinks",
            SettingsField::HomepageContent => "homepageContent",
            SettingsField::FooterTopContent => "footerTopContent",
            SettingsField::HeroHeading => "heroHeading",
            SettingsField::HeroDescription => "heroDescription",
        }
    }

    /// Entry key in the row-per-field layout
    pub fn entry_key(self) -> &'static str {
        match self {
            SettingsField::MaintenanceMode => "maintenance_mode",
            SettingsField::WebsiteTitle => "website_title",
            SettingsField::WebsiteLogo => "website_logo",
            SettingsField::SocialLinks => "social_links",
            SettingsField::HomepageContent => "homepage_content",
            SettingsField::FooterTopContent => "footer_top_content",
            SettingsField::HeroHeading => "hero_heading",
            SettingsField::HeroDescription => "hero_description",
        }
    }
}

/// Rejections at the write boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("social link id '{0}' appears more than once")]
    DuplicateLinkId(String),
    #[error("platform '{0}' is already added")]
    DuplicatePlatform(SocialPlatform),
    #[error("social link for '{0}' has an empty url")]
    EmptyLinkUrl(SocialPlatform),
}

/// Merge-patch over the aggregate: `None` leaves a field untouched
///
/// `website_logo` is doubly optional so a patch can clear the logo
/// (`Some(None)`) as well as leave it alone (`None`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub maintenance_mode: Option<bool>,
    pub website_title: Option<String>,
    pub website_logo: Option<Option<String>>,
    pub social_links: Option<Vec<SocialLink>>,
    pub homepage_content: Option<String>,
    pub footer_top_content: Option<String>,
    pub hero_heading: Option<String>,
    pub hero_description: Option<String>,
}

impl SettingsPatch {
    /// Patch carrying every field of `settings`
    pub fn full(settings: &SettingsAggregate) -> Self {
        Self {
            maintenance_mode: Some(settings.maintenance_mode),
            website_title: Some(settings.website_title.clone()),
            website_logo: Some(settings.website_logo.clone()),
            social_links: Some(settings.social_links.clone()),
            homepage_content: Some(settings.homepage_content.clone()),
            footer_top_content: Some(settings.footer_top_content.clone()),
            hero_heading: Some(settings.hero_heading.clone()),
            hero_description: Some(settings.hero_description.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Fields this patch touches, in declaration order
    pub fn fields(&self) -> Vec<SettingsField> {
        SettingsField::ALL
            .into_iter()
            .filter(|field| self.touches(*field))
            .collect()
    }

    pub fn touches(&self, field: SettingsField) -> bool {
        match field {
            SettingsField::MaintenanceMode => self.maintenance_mode.is_some(),
            SettingsField::WebsiteTitle => self.website_title.is_some(),
            SettingsField::WebsiteLogo => self.website_logo.is_some(),
            SettingsField::SocialLinks => self.social_links.is_some(),
            SettingsField::HomepageContent => self.homepage_content.is_some(),
            SettingsField::FooterTopContent => self.footer_top_content.is_some(),
            SettingsField::HeroHeading => self.hero_heading.is_some(),
            SettingsField::HeroDescription => self.hero_description.is_some(),
        }
    }

    /// Take every field that `newer` sets
    pub fn overlay(&mut self, newer: &SettingsPatch) {
        if newer.maintenance_mode.is_some() {
            self.maintenance_mode = newer.maintenance_mode;
        }
        if newer.website_title.is_some() {
            self.website_title.clone_from(&newer.website_title);
        }
        if newer.website_logo.is_some() {
            self.website_logo.clone_from(&newer.website_logo);
        }
        if newer.social_links.is_some() {
            self.social_links.clone_from(&newer.social_links);
        }
        if newer.homepage_content.is_some() {
            self.homepage_content.clone_from(&newer.homepage_content);
        }
        if newer.footer_top_content.is_some() {
            self.footer_top_content.clone_from(&newer.footer_top_content);
        }
        if newer.hero_heading.is_some() {
            self.hero_heading.clone_from(&newer.hero_heading);
        }
        if newer.hero_description.is_some() {
            self.hero_description.clone_from(&newer.hero_description);
        }
    }

    /// True if every field set here is set to the same value in `other`
    pub fn is_covered_by(&self, other: &SettingsPatch) -> bool {
        fn covered<T: PartialEq>(mine: &Option<T>, theirs: &Option<T>) -> bool {
            match mine {
                Some(value) => theirs.as_ref() == Some(value),
                None => true,
            }
        }

        covered(&self.maintenance_mode, &other.maintenance_mode)
            && covered(&self.website_title, &other.website_title)
            && covered(&self.website_logo, &other.website_logo)
            && covered(&self.social_links, &other.social_links)
            && covered(&self.homepage_content, &other.homepage_content)
            && covered(&self.footer_top_content, &other.footer_top_content)
            && covered(&self.hero_heading, &other.hero_heading)
            && covered(&self.hero_description, &other.hero_description)
    }

    /// Check write-boundary rules: unique link ids, one link per platform,
    /// non-empty urls
    pub fn validate(&self) -> Result<(), PatchError> {
        let Some(links) = &self.social_links else {
            return Ok(());
        };

        let mut ids = HashSet::new();
        let mut platforms = HashSet::new();
        for link in links {
            if link.url.trim().is_empty() {
                return Err(PatchError::EmptyLinkUrl(link.platform));
            }
            if !ids.insert(link.id.as_str()) {
                return Err(PatchError::DuplicateLinkId(link.id.clone()));
            }
            if !platforms.insert(link.platform) {
                return Err(PatchError::DuplicatePlatform(link.platform));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: &str, platform: SocialPlatform, url: &str) -> SocialLink {
        SocialLink {
            id: id.to_string(),
            platform,
            url: url.to_string(),
            added_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_defaults_are_renderable() {
        let settings = SettingsAggregate::default();
        assert_eq!(settings.website_title, "VATCalc");
        assert!(!settings.maintenance_mode);
        assert!(settings.website_logo.is_none());
        assert!(settings.social_links.is_empty());
    }

    #[test]
    fn test_apply_only_touches_supplied_fields() {
        let mut settings = SettingsAggregate::default();
        settings.hero_description = "Calculate VAT".to_string();

        let changed = settings.apply(&SettingsPatch {
            hero_heading: Some("Fast VAT".to_string()),
            ..Default::default()
        });

        assert!(changed);
        assert_eq!(settings.hero_heading, "Fast VAT");
        assert_eq!(settings.hero_description, "Calculate VAT");
        assert_eq!(settings.website_title, "VATCalc");
    }

    #[test]
    fn test_apply_can_clear_logo() {
        let mut settings = SettingsAggregate {
            website_logo: Some("data:image/png;base64,AAAA".to_string()),
            ..Default::default()
        };

        // Untouched logo stays
        settings.apply(&SettingsPatch::default());
        assert!(settings.website_logo.is_some());

        settings.apply(&SettingsPatch {
            website_logo: Some(None),
            ..Default::default()
        });
        assert!(settings.website_logo.is_none());
    }

    #[test]
    fn test_apply_reports_no_change_for_same_values() {
        let mut settings = SettingsAggregate::default();
        let patch = SettingsPatch {
            website_title: Some("VATCalc".to_string()),
            ..Default::default()
        };
        assert!(!settings.apply(&patch));
    }

    #[test]
    fn test_fields_lists_touched_fields() {
        let patch = SettingsPatch {
            maintenance_mode: Some(true),
            hero_description: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            patch.fields(),
            vec![SettingsField::MaintenanceMode, SettingsField::HeroDescription]
        );
        assert!(SettingsPatch::default().is_empty());
        assert_eq!(SettingsPatch::full(&SettingsAggregate::default()).fields().len(), 8);
    }

    #[test]
    fn test_is_covered_by() {
        let patch = SettingsPatch {
            hero_heading: Some("X".to_string()),
            ..Default::default()
        };
        let echo = SettingsPatch::full(&SettingsAggregate {
            hero_heading: "X".to_string(),
            ..Default::default()
        });
        assert!(patch.is_covered_by(&echo));

        let stale = SettingsPatch::full(&SettingsAggregate::default());
        assert!(!patch.is_covered_by(&stale));
    }

    #[test]
    fn test_overlay_takes_only_set_fields() {
        let mut inbound = SettingsPatch {
            hero_heading: Some("A".to_string()),
            hero_description: Some(String::new()),
            ..Default::default()
        };
        inbound.overlay(&SettingsPatch {
            hero_description: Some("B".to_string()),
            website_logo: Some(None),
            ..Default::default()
        });

        assert_eq!(inbound.hero_heading.as_deref(), Some("A"));
        assert_eq!(inbound.hero_description.as_deref(), Some("B"));
        assert_eq!(inbound.website_logo, Some(None));
        assert!(inbound.website_title.is_none());
    }

    #[test]
    fn test_validate_rejects_duplicate_platform() {
        let patch = SettingsPatch {
            social_links: Some(vec![
                link("1", SocialPlatform::Github, "https://github.com/a"),
                link("2", SocialPlatform::Github, "https://github.com/b"),
            ]),
            ..Default::default()
        };
        assert_eq!(
            patch.validate(),
            Err(PatchError::DuplicatePlatform(SocialPlatform::Github))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_id_and_empty_url() {
        let dup_id = SettingsPatch {
            social_links: Some(vec![
                link("1", SocialPlatform::Github, "https://github.com/a"),
                link("1", SocialPlatform::Twitter, "https://twitter.com/a"),
            ]),
            ..Default::default()
        };
        assert_eq!(dup_id.validate(), Err(PatchError::DuplicateLinkId("1".to_string())));

        let empty_url = SettingsPatch {
            social_links: Some(vec![link("1", SocialPlatform::Website, "  ")]),
            ..Default::default()
        };
        assert_eq!(
            empty_url.validate(),
            Err(PatchError::EmptyLinkUrl(SocialPlatform::Website))
        );
    }

    #[test]
    fn test_validate_accepts_distinct_links() {
        let patch = SettingsPatch {
            social_links: Some(vec![
                link("1", SocialPlatform::Github, "https://github.com/a"),
                link("2", SocialPlatform::Telegram, "https://t.me/a"),
            ]),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn test_social_link_new_trims_url() {
        let link = SocialLink::new(SocialPlatform::Youtube, "  https://youtube.com/c  ");
        assert_eq!(link.url, "https://youtube.com/c");
        assert!(!link.id.is_empty());
        assert!(link.added_at.ends_with('Z'));
    }
}
