//! Social media platforms that can appear in the footer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed set of supported platforms
///
/// Serialized in lowercase (`"facebook"`, `"github"`, ...), which is also the
/// stored form inside `socialLinks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Facebook,
    Instagram,
    Twitter,
    Youtube,
    Linkedin,
    Github,
    Website,
    Telegram,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown social platform '{0}'")]
pub struct UnknownPlatform(pub String);

impl SocialPlatform {
    pub const ALL: [SocialPlatform; 8] = [
        SocialPlatform::Facebook,
        SocialPlatform::Instagram,
        SocialPlatform::Twitter,
        SocialPlatform::Youtube,
        SocialPlatform::Linkedin,
        SocialPlatform::Github,
        SocialPlatform::Website,
        SocialPlatform::Telegram,
    ];

    /// Stored key
    pub fn key(self) -> &'static str {
        match self {
            SocialPlatform::Facebook => "facebook",
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::Twitter => "twitter",
            SocialPlatform::Youtube => "youtube",
            SocialPlatform::Linkedin => "linkedin",
            SocialPlatform::Github => "github",
            SocialPlatform::Website => "website",
            SocialPlatform::Telegram => "telegram",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SocialPlatform::Facebook => "Facebook",
            SocialPlatform::Instagram => "Instagram",
            SocialPlatform::Twitter => "Twitter",
            SocialPlatform::Youtube => "YouTube",
            SocialPlatform::Linkedin => "LinkedIn",
            SocialPlatform::Github => "GitHub",
            SocialPlatform::Website => "Website",
            SocialPlatform::Telegram => "Telegram",
        }
    }

    /// Brand colour as `#RRGGBB`
    pub fn brand_color(self) -> &'static str {
        match self {
            SocialPlatform::Facebook => "#1877F2",
            SocialPlatform::Instagram => "#E4405F",
            SocialPlatform::Twitter => "#1DA1F2",
            SocialPlatform::Youtube => "#FF0000",
            SocialPlatform::Linkedin => "#0077B5",
            SocialPlatform::Github => "#333333",
            SocialPlatform::Website => "#6366F1",
            SocialPlatform::Telegram => "#0088CC",
        }
    }

    /// Example URL shown in the admin form
    pub fn url_placeholder(self) -> &'static str {
        match self {
            SocialPlatform::Facebook => "https://facebook.com/yourpage",
            SocialPlatform::Instagram => "https://instagram.com/yourpage",
            SocialPlatform::Twitter => "https://twitter.com/yourpage",
            SocialPlatform::Youtube => "https://youtube.com/yourchannel",
            SocialPlatform::Linkedin => "https://linkedin.com/company/yourcompany",
            SocialPlatform::Github => "https://github.com/yourusername",
            SocialPlatform::Website => "https://yourwebsite.com",
            SocialPlatform::Telegram => "https://t.me/yourchannel",
        }
    }
}

impl fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SocialPlatform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        SocialPlatform::ALL
            .into_iter()
            .find(|p| p.key() == needle)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_platforms() {
        for platform in SocialPlatform::ALL {
            assert_eq!(platform.key().parse::<SocialPlatform>(), Ok(platform));
        }
        // Case and surrounding whitespace are ignored
        assert_eq!(" GitHub ".parse::<SocialPlatform>(), Ok(SocialPlatform::Github));
    }

    #[test]
    fn test_parse_unknown_platform_rejected() {
        let err = "myspace".parse::<SocialPlatform>().unwrap_err();
        assert_eq!(err, UnknownPlatform("myspace".to_string()));
    }

    #[test]
    fn test_serde_uses_lowercase_key() {
        let json = serde_json::to_string(&SocialPlatform::Linkedin).unwrap();
        assert_eq!(json, "\"linkedin\"");

        let parsed: Result<SocialPlatform, _> = serde_json::from_str("\"tiktok\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_brand_colors_are_hex() {
        for platform in SocialPlatform::ALL {
            let color = platform.brand_color();
            assert_eq!(color.len(), 7, "{platform}");
            assert!(color.starts_with('#'));
            assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
