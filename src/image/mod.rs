//! Representative-image selection for one feed entry.
//!
//! Precedence, first match wins:
//!
//! 1. enclosure URL
//! 2. media extension: `url` attribute, then the element's own text if it is an http(s) URL
//! 3. first `<img src="...">` in `content:encoded`, then description, then raw content
//!
//! The HTML scan is a text pattern, not an HTML parse. Only the first `<img>`
//! of the first field that has one is considered.

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::domain::FeedEntry;

static IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"]+)"|'([^']+)')"#)
        .expect("image src pattern is valid")
});

/// Which heuristic produced an image, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTier {
    Enclosure,
    MediaAttribute,
    MediaText,
    EncodedContent,
    Description,
    Content,
}

#[derive(Debug, Clone, Default)]
pub struct ImageResolver;

impl ImageResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, entry: &FeedEntry) -> Option<String> {
        self.resolve_with_tier(entry).map(|(url, _)| url)
    }

    pub fn resolve_with_tier(&self, entry: &FeedEntry) -> Option<(String, ImageTier)> {
        let structured = [
            (&entry.enclosure_url, ImageTier::Enclosure),
            (&entry.media_url, ImageTier::MediaAttribute),
        ];
        for (value, tier) in structured {
            if let Some(url) = value.as_deref().and_then(clean) {
                return Some((url, tier));
            }
        }

        // Free text, so it must at least look like a URL.
        if let Some(url) = entry
            .media_text
            .as_deref()
            .and_then(clean)
            .filter(|u| is_absolute_http(u))
        {
            return Some((url, ImageTier::MediaText));
        }

        let html = [
            (&entry.encoded_content, ImageTier::EncodedContent),
            (&entry.description, ImageTier::Description),
            (&entry.content, ImageTier::Content),
        ];
        html.into_iter().find_map(|(value, tier)| {
            value
                .as_deref()
                .and_then(first_img_src)
                .map(|url| (url, tier))
        })
    }
}

fn clean(raw: &str) -> Option<String> {
    let url = decode_html_entities(raw.trim()).trim().to_string();
    (!url.is_empty()).then_some(url)
}

fn is_absolute_http(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// First `<img src>` value in an HTML fragment.
pub fn first_img_src(html: &str) -> Option<String> {
    let caps = IMG_SRC.captures(html)?;
    caps.get(1).or_else(|| caps.get(2)).and_then(|m| clean(m.as_str()))
}
