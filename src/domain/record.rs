use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_LIST_LIMIT: usize = 100;

/// The normalized, store-ready news item. `link` is its identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsRecord {
    pub title: String,
    pub link: String,
    pub image_url: Option<String>,
    pub category: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Read-side filter for listing stored records, newest first.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    pub category: Option<String>,
    pub source: Option<String>,
    /// Restrict to any of these categories (the "for you" view).
    pub categories: Option<Vec<String>>,
    pub limit: usize,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            category: None,
            source: None,
            categories: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}
