//! Platform detection for supported video hosts
//!
//! Classification looks only at the normalized host of a URL, so a path
//! like `https://example.com/youtube.com/video` is never mistaken for a
//! YouTube link.

use crate::utils::url::host_of;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Video platform a URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Instagram,
    Facebook,
    Telegram,
    Unknown,
}

/// Host patterns per platform. Each matches the registrable domain and any subdomain.
static HOST_TABLE: LazyLock<Vec<(Platform, Regex)>> = LazyLock::new(|| {
    [
        (Platform::YouTube, r"^(?:[a-z0-9-]+\.)*(?:youtube\.com|youtu\.be|youtube-nocookie\.com)$"),
        (Platform::Instagram, r"^(?:[a-z0-9-]+\.)*(?:instagram\.com|instagr\.am)$"),
        (Platform::Facebook, r"^(?:[a-z0-9-]+\.)*(?:facebook\.com|fb\.com|fb\.watch)$"),
        (Platform::Telegram, r"^(?:[a-z0-9-]+\.)*(?:t\.me|telegram\.me|telegram\.org)$"),
    ]
    .into_iter()
    .filter_map(|(platform, pattern)| Regex::new(pattern).ok().map(|re| (platform, re)))
    .collect()
});

impl Platform {
    /// Platforms the downloader accepts
    pub fn supported() -> &'static [Platform] {
        &[
            Platform::YouTube,
            Platform::Instagram,
            Platform::Facebook,
            Platform::Telegram,
        ]
    }

    /// Lowercase tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Telegram => "telegram",
            Platform::Unknown => "unknown",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
            Platform::Telegram => "Telegram",
            Platform::Unknown => "Unknown",
        }
    }

    /// File name used when a title sanitizes down to nothing
    pub fn placeholder_title(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube_video",
            Platform::Instagram => "instagram_video",
            Platform::Facebook => "facebook_video",
            Platform::Telegram => "telegram_video",
            Platform::Unknown => "video",
        }
    }

    pub fn is_supported(&self) -> bool {
        *self != Platform::Unknown
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a URL by its host. Never fails: anything unrecognized is `Unknown`.
pub fn classify(url: &str) -> Platform {
    let Some(host) = host_of(url) else {
        return Platform::Unknown;
    };

    HOST_TABLE
        .iter()
        .find(|(_, pattern)| pattern.is_match(&host))
        .map(|(platform, _)| *platform)
        .unwrap_or(Platform::Unknown)
}

/// Check if URL belongs to a supported platform
pub fn is_supported(url: &str) -> bool {
    classify(url) != Platform::Unknown
}

/// Comma-separated list of supported platform names
pub fn supported_list() -> String {
    Platform::supported()
        .iter()
        .map(|p| p.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_hosts() {
        assert_eq!(classify("https://youtu.be/abc123"), Platform::YouTube);
        assert_eq!(classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Platform::YouTube);
        assert_eq!(classify("https://m.youtube.com/shorts/brZCOVlyPPo"), Platform::YouTube);
        assert_eq!(classify("https://www.instagram.com/p/ABC123/"), Platform::Instagram);
        assert_eq!(classify("https://instagr.am/reel/xyz"), Platform::Instagram);
        assert_eq!(classify("https://www.facebook.com/watch/?v=123"), Platform::Facebook);
        assert_eq!(classify("https://fb.watch/abcDEF/"), Platform::Facebook);
        assert_eq!(classify("https://t.me/channel/123"), Platform::Telegram);
        assert_eq!(classify("https://telegram.org/blog"), Platform::Telegram);
    }

    #[test]
    fn test_classify_tolerates_formatting() {
        assert_eq!(classify("  youtu.be/abc123  "), Platform::YouTube);
        assert_eq!(classify("HTTPS://WWW.YOUTUBE.COM/watch?v=x"), Platform::YouTube);
        assert_eq!(classify("www.instagram.com/p/1?igsh=abc#top"), Platform::Instagram);
        assert_eq!(classify("http://t.me/c/1/2?single"), Platform::Telegram);
    }

    #[test]
    fn test_classify_schemeless_with_url_in_query_or_fragment() {
        assert_eq!(
            classify("youtu.be/abc123?si=x&next=https://example.com"),
            Platform::YouTube
        );
        assert_eq!(classify("www.youtube.com/watch?v=abc#t=https://x"), Platform::YouTube);
        assert_eq!(classify("t.me/channel/1?ref=http://foo"), Platform::Telegram);
        assert_eq!(classify("example.com/?next=https://t.me/x"), Platform::Unknown);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify("https://example.com/video"), Platform::Unknown);
        assert_eq!(classify(""), Platform::Unknown);
        assert_eq!(classify("hello world"), Platform::Unknown);
        assert_eq!(classify("https://vimeo.com/123"), Platform::Unknown);
    }

    #[test]
    fn test_classify_ignores_platform_names_outside_host() {
        assert_eq!(classify("https://example.com/youtube.com/watch"), Platform::Unknown);
        assert_eq!(classify("https://example.com/?next=https://t.me/x"), Platform::Unknown);
        assert_eq!(classify("https://notyoutube.com/watch"), Platform::Unknown);
        assert_eq!(classify("https://youtube.com.evil.net/watch"), Platform::Unknown);
        assert_eq!(classify("https://youtube.com@evil.net/watch"), Platform::Unknown);
        assert_eq!(classify("https://at.me/x"), Platform::Unknown);
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported("https://youtu.be/abc123"));
        assert!(!is_supported("https://example.com/video"));
        assert!(Platform::Telegram.is_supported());
        assert!(!Platform::Unknown.is_supported());
    }

    #[test]
    fn test_names() {
        assert_eq!(Platform::YouTube.to_string(), "youtube");
        assert_eq!(Platform::Facebook.display_name(), "Facebook");
        assert_eq!(Platform::Unknown.placeholder_title(), "video");
        assert_eq!(supported_list(), "YouTube, Instagram, Facebook, Telegram");
    }
}
