use chrono::{DateTime, Utc};

/// One item of a parsed feed, before normalization.
///
/// Every vendor extension the image heuristics care about is resolved into
/// its own field at parse time; nothing downstream re-reads the raw XML.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// `<enclosure url="...">` or Atom `<link rel="enclosure">`.
    pub enclosure_url: Option<String>,
    /// `url` attribute of `media:content` (or `media:thumbnail`).
    pub media_url: Option<String>,
    /// Text body of `media:content`, used by feeds that put the URL inline.
    pub media_text: Option<String>,
    /// `content:encoded` HTML.
    pub encoded_content: Option<String>,
    /// `description` / `summary` HTML.
    pub description: Option<String>,
    /// Atom `<content>` or any other raw content body.
    pub content: Option<String>,
}

impl FeedEntry {
    pub fn new(title: &str, link: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            ..Self::default()
        }
    }
}
