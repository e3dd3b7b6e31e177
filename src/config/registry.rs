//! The static list of feeds to ingest.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::Source;

/// `(category, endpoint, label)` of the stock registry.
pub const DEFAULT_SOURCES: &[(&str, &str, &str)] = &[
    ("Spor", "https://www.trthaber.com/spor_articles.rss", "TRT Haber"),
    ("Ekonomi", "https://www.trthaber.com/ekonomi_articles.rss", "TRT Haber"),
    ("Teknoloji", "https://www.trthaber.com/bilim_teknoloji_articles.rss", "TRT Haber"),
    ("Gündem", "https://www.trthaber.com/manset_articles.rss", "TRT Haber"),
    ("Dünya", "https://www.trthaber.com/dunya_articles.rss", "TRT Haber"),
    ("Spor", "https://www.cnnturk.com/feed/66/rss", "CNN Türk"),
    ("Ekonomi", "https://www.cnnturk.com/feed/71/rss", "CNN Türk"),
    ("Teknoloji", "https://www.cnnturk.com/feed/58/rss", "CNN Türk"),
    ("Spor", "https://www.ensonhaber.com/rss/spor.xml", "Ensonhaber"),
    ("Ekonomi", "https://www.ensonhaber.com/rss/ekonomi.xml", "Ensonhaber"),
    ("Gündem", "https://www.ensonhaber.com/rss/manset.xml", "Ensonhaber"),
    ("Gündem", "https://www.ntv.com.tr/gundem.rss", "NTV"),
    ("Teknoloji", "https://www.ntv.com.tr/teknoloji.rss", "NTV"),
    ("Dünya", "https://www.ntv.com.tr/dunya.rss", "NTV"),
    ("Ekonomi", "https://www.ntv.com.tr/ekonomi.rss", "NTV"),
    ("Ekonomi", "https://www.haberturk.com/rss/ekonomi.xml", "Habertürk"),
    ("Gündem", "https://www.haberturk.com/rss/manset.xml", "Habertürk"),
    ("Teknoloji", "https://www.donanimhaber.com/rss/tum/", "DonanımHaber"),
];

/// One `[[sources]]` table as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub category: String,
    pub endpoint: String,
    pub label: String,
}

pub fn default_source_entries() -> Vec<SourceEntry> {
    DEFAULT_SOURCES
        .iter()
        .map(|(category, endpoint, label)| SourceEntry {
            category: category.to_string(),
            endpoint: endpoint.to_string(),
            label: label.to_string(),
        })
        .collect()
}

/// Validated, ordered, read-only set of sources for a run.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    /// Validate every entry; one bad entry makes the whole registry unusable.
    pub fn from_entries(entries: &[SourceEntry]) -> Result<Self, ConfigError> {
        let sources = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Source::new(&entry.category, &entry.endpoint, &entry.label).map_err(|e| {
                    ConfigError::InvalidSource {
                        index,
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
