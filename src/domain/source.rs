use url::Url;

use crate::app::{NewsdeskError, Result};

/// One registry entry: where to fetch a feed and how to tag what it yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub category: String,
    pub endpoint: Url,
    pub label: String,
}

impl Source {
    pub fn new(category: &str, endpoint: &str, label: &str) -> Result<Self> {
        let category = category.trim();
        let label = label.trim();

        if category.is_empty() {
            return Err(NewsdeskError::Config(format!(
                "source {} has an empty category",
                endpoint
            )));
        }
        if label.is_empty() {
            return Err(NewsdeskError::Config(format!(
                "source {} has an empty label",
                endpoint
            )));
        }

        let endpoint = Url::parse(endpoint.trim())?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(NewsdeskError::Config(format!(
                "source {} ({}) must use http or https, got {}",
                label,
                category,
                endpoint.scheme()
            )));
        }

        Ok(Self {
            category: category.to_string(),
            endpoint,
            label: label.to_string(),
        })
    }
}
