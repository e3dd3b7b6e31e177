use feed_rs::parser;
use html_escape::decode_html_entities;
use serde::Deserialize;

use crate::app::{NewsdeskError, Result};
use crate::domain::FeedEntry;

/// The item image fields `feed-rs` does not carry over.
#[derive(Debug, Default, Deserialize)]
struct ItemImages {
    image: Option<String>,
    banner_image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedImages {
    #[serde(default)]
    items: Vec<ItemImages>,
}

/// Decode anything the XML reader does not handle (JSON Feed) via `feed-rs`.
///
/// Attachments arrive as links with a MIME type and fill the enclosure slot.
/// The item `image` (or `banner_image`) fills the media slot.
pub(super) fn parse(body: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(body).map_err(|e| NewsdeskError::FeedParse(e.to_string()))?;
    // feed-rs keeps items in document order, one entry per item.
    let mut images = serde_json::from_slice::<FeedImages>(body)
        .unwrap_or_default()
        .items
        .into_iter();

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let (attachments, pages): (Vec<_>, Vec<_>) =
                entry.links.into_iter().partition(|l| l.media_type.is_some());
            let item_images = images.next().unwrap_or_default();

            FeedEntry {
                title: entry
                    .title
                    .map(|t| decode_html_entities(&t.content).to_string()),
                link: pages.into_iter().next().map(|l| l.href),
                published_at: entry.published.or(entry.updated),
                enclosure_url: attachments.into_iter().next().map(|l| l.href),
                media_url: item_images.image.or(item_images.banner_image),
                media_text: None,
                encoded_content: entry.content.and_then(|c| c.body),
                description: entry.summary.map(|s| s.content),
                content: None,
            }
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const JSON_FEED: &str = r#"{
  "version": "https://jsonfeed.org/version/1.1",
  "title": "JSON Feed",
  "items": [
    {
      "id": "1",
      "url": "https://example.com/json1",
      "title": "JSON Item",
      "content_html": "<p>Hello</p>",
      "date_published": "2024-01-02T03:04:05Z"
    },
    {
      "id": "2",
      "title": "No link"
    }
  ]
}"#;

    #[test]
    fn test_parse_json_feed() {
        let entries = parse(JSON_FEED.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title.as_deref(), Some("JSON Item"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/json1"));
        assert_eq!(
            entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
        assert_eq!(entries[1].link, None);
    }

    #[test]
    fn test_attachments_and_item_images() {
        let json = r#"{
  "version": "https://jsonfeed.org/version/1.1",
  "title": "Images",
  "items": [
    {
      "id": "1",
      "url": "https://example.com/a",
      "title": "With both",
      "image": "https://img.example.com/a.jpg",
      "attachments": [
        {"url": "https://img.example.com/a-attachment.jpg", "mime_type": "image/jpeg"}
      ]
    },
    {
      "id": "2",
      "title": "Attachment only, no page",
      "attachments": [
        {"url": "https://img.example.com/b.jpg", "mime_type": "image/jpeg"}
      ]
    },
    {
      "id": "3",
      "url": "https://example.com/c",
      "title": "Banner",
      "banner_image": "https://img.example.com/c-banner.jpg"
    }
  ]
}"#;
        let entries = parse(json.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/a"));
        assert_eq!(
            entries[0].enclosure_url.as_deref(),
            Some("https://img.example.com/a-attachment.jpg")
        );
        assert_eq!(entries[0].media_url.as_deref(), Some("https://img.example.com/a.jpg"));

        // An attachment is never mistaken for the article link.
        assert_eq!(entries[1].link, None);
        assert_eq!(entries[1].enclosure_url.as_deref(), Some("https://img.example.com/b.jpg"));
        assert_eq!(entries[1].media_url, None);

        assert_eq!(entries[2].enclosure_url, None);
        assert_eq!(
            entries[2].media_url.as_deref(),
            Some("https://img.example.com/c-banner.jpg")
        );
    }

    #[test]
    fn test_invalid_json_is_feed_parse_error() {
        let err = parse(br#"{"not": "a feed""#).unwrap_err();
        assert!(matches!(err, NewsdeskError::FeedParse(_)));
    }
}
