use chrono::{DateTime, Utc};
use html_escape::decode_html_entities;
use url::Url;

use crate::domain::{FeedEntry, NewsRecord, Source};

/// Turns a parsed entry into a store-ready record.
///
/// Category and source always come from the [`Source`]; feed content never
/// overrides them.
#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// `None` means the entry was dropped for lacking a title or link.
    pub fn normalize(
        &self,
        entry: FeedEntry,
        source: &Source,
        image_url: Option<String>,
    ) -> Option<NewsRecord> {
        self.normalize_at(entry, source, image_url, Utc::now())
    }

    pub fn normalize_at(
        &self,
        entry: FeedEntry,
        source: &Source,
        image_url: Option<String>,
        ingested_at: DateTime<Utc>,
    ) -> Option<NewsRecord> {
        let title = entry.title.as_deref().map(clean_title).filter(|t| !t.is_empty())?;
        let link = entry
            .link
            .as_deref()
            .and_then(|l| resolve_link(l, &source.endpoint))?;

        Some(NewsRecord {
            title,
            link,
            image_url: image_url.filter(|u| !u.trim().is_empty()),
            category: source.category.clone(),
            source: source.label.clone(),
            created_at: entry.published_at.unwrap_or(ingested_at),
        })
    }
}

fn clean_title(raw: &str) -> String {
    decode_html_entities(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Absolute links are kept verbatim; relative ones are joined onto the feed URL.
fn resolve_link(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(raw).ok().map(String::from)
        }
        _ => Some(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn source() -> Source {
        Source::new("Tech", "https://news.example.com/rss/tech.xml", "X").unwrap()
    }

    #[test]
    fn test_normalize_copies_source_metadata() {
        let entry = FeedEntry::new("A", "http://a");
        let record = Normalizer::new()
            .normalize(entry, &source(), Some("http://img/a.jpg".into()))
            .unwrap();

        assert_eq!(record.title, "A");
        assert_eq!(record.link, "http://a");
        assert_eq!(record.image_url.as_deref(), Some("http://img/a.jpg"));
        assert_eq!(record.category, "Tech");
        assert_eq!(record.source, "X");
    }

    #[test]
    fn test_missing_title_or_link_is_dropped() {
        let normalizer = Normalizer::new();

        let mut no_title = FeedEntry::new("A", "http://a");
        no_title.title = None;
        assert!(normalizer.normalize(no_title, &source(), None).is_none());

        let mut no_link = FeedEntry::new("A", "http://a");
        no_link.link = None;
        assert!(normalizer.normalize(no_link, &source(), None).is_none());

        let blank = FeedEntry::new("  \n ", "http://a");
        assert!(normalizer.normalize(blank, &source(), None).is_none());

        let blank_link = FeedEntry::new("A", "   ");
        assert!(normalizer.normalize(blank_link, &source(), None).is_none());
    }

    #[test]
    fn test_publish_time_is_used_when_present() {
        let published = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let mut entry = FeedEntry::new("A", "http://a");
        entry.published_at = Some(published);

        let record = Normalizer::new().normalize(entry, &source(), None).unwrap();
        assert_eq!(record.created_at, published);
    }

    #[test]
    fn test_missing_publish_time_falls_back_to_ingestion_time() {
        let before = Utc::now();
        let record = Normalizer::new()
            .normalize(FeedEntry::new("A", "http://a"), &source(), None)
            .unwrap();
        let after = Utc::now();

        assert!(record.created_at >= before - Duration::seconds(1));
        assert!(record.created_at <= after + Duration::seconds(1));
        assert!(record.created_at.timestamp() > 0);
    }

    #[test]
    fn test_title_is_decoded_and_collapsed() {
        let entry = FeedEntry::new("  Borsa &amp; Piyasalar\n  güne   yükselişle başladı ", "http://a");
        let record = Normalizer::new().normalize(entry, &source(), None).unwrap();
        assert_eq!(record.title, "Borsa & Piyasalar güne yükselişle başladı");
    }

    #[test]
    fn test_relative_link_is_resolved_against_endpoint() {
        let entry = FeedEntry::new("A", "/haber/123");
        let record = Normalizer::new().normalize(entry, &source(), None).unwrap();
        assert_eq!(record.link, "https://news.example.com/haber/123");
    }

    #[test]
    fn test_empty_image_becomes_none() {
        let record = Normalizer::new()
            .normalize(FeedEntry::new("A", "http://a"), &source(), Some(" ".into()))
            .unwrap();
        assert_eq!(record.image_url, None);
    }
}
