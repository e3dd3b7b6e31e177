use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::app::{NewsdeskError, Result};
use crate::config::FetcherConfig;
use crate::domain::Source;
use crate::fetcher::Fetcher;

const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, application/feed+json;q=0.8, */*;q=0.5";

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_FEEDS));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("tr-TR,tr;q=0.9,en;q=0.8"));

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self { client, timeout })
    }

    fn failure(source: &Source, reason: String) -> NewsdeskError {
        NewsdeskError::FetchFailed {
            label: source.label.clone(),
            category: source.category.clone(),
            reason,
        }
    }

    fn describe(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("timed out after {}s", self.timeout.as_secs())
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(source.endpoint.clone())
            .send()
            .await
            .map_err(|e| Self::failure(source, self.describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::failure(source, format!("HTTP status {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::failure(source, self.describe(&e)))?;

        if body.is_empty() {
            return Err(Self::failure(source, "empty response body".into()));
        }

        tracing::debug!(source = %source.label, bytes = body.len(), "fetched feed");
        Ok(body.to_vec())
    }
}
