//! The ingestion run: every registry source goes through
//! fetch → parse → (per entry) image → normalize → upsert.
//!
//! Sources run as independent tasks on a bounded pool. A fetch or parse
//! failure only zeroes that source's contribution; a failed upsert only loses
//! that record.

mod report;

pub use report::{RunReport, RunSummary, SourceOutcome, SourceReport};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::app::{NewsdeskError, Result};
use crate::config::{SourceRegistry, DEFAULT_TIMEOUT_SECS, DEFAULT_WORKERS};
use crate::domain::Source;
use crate::fetcher::Fetcher;
use crate::image::ImageResolver;
use crate::normalizer::Normalizer;
use crate::parser::FeedParser;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Everything a source task needs, shared read-only across tasks.
struct Pipeline {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    parser: FeedParser,
    resolver: ImageResolver,
    normalizer: Normalizer,
}

/// Seconds allowed on top of the fetcher's own request timeout.
const FETCH_TIMEOUT_SLACK_SECS: u64 = 5;

/// Outer bound for a fetcher configured with `timeout_secs`.
pub fn fetch_timeout_for(timeout_secs: u64) -> Duration {
    Duration::from_secs(timeout_secs.max(1).saturating_add(FETCH_TIMEOUT_SLACK_SECS))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SourceStats {
    entries: usize,
    upserted: usize,
    dropped: usize,
    persist_failed: usize,
}

pub struct Ingestor<S> {
    registry: Arc<SourceRegistry>,
    pipeline: Arc<Pipeline>,
    store: Arc<S>,
    workers: usize,
    fetch_timeout: Duration,
    state: Mutex<RunState>,
}

impl<S: Store + Send + Sync + 'static> Ingestor<S> {
    pub fn new(
        registry: SourceRegistry,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        store: Arc<S>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            pipeline: Arc::new(Pipeline {
                fetcher,
                parser: FeedParser::new(),
                resolver: ImageResolver::new(),
                normalizer: Normalizer::new(),
            }),
            store,
            workers: DEFAULT_WORKERS,
            fetch_timeout: fetch_timeout_for(DEFAULT_TIMEOUT_SECS),
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Upper bound on one source's fetch, whatever the fetcher does internally.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn state(&self) -> RunState {
        self.state.lock().map(|s| *s).unwrap_or(RunState::Failed)
    }

    fn set_state(&self, next: RunState) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| NewsdeskError::Other(format!("run state lock poisoned: {}", e)))?;
        if next == RunState::Running && *state == RunState::Running {
            return Err(NewsdeskError::Other(
                "an ingestion run is already in progress".into(),
            ));
        }
        *state = next;
        Ok(())
    }

    /// Run ingestion over the whole registry once.
    ///
    /// Returns `Err` only for faults in the run's own control flow; source and
    /// record failures are reported inside the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        self.set_state(RunState::Running)?;

        match self.run_sources().await {
            Ok(summary) => {
                self.set_state(RunState::Completed)?;
                Ok(summary)
            }
            Err(e) => {
                self.set_state(RunState::Failed)?;
                tracing::error!("ingestion run failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_sources(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let upserted = Arc::new(AtomicUsize::new(0));
        let semaphore = Arc::new(Semaphore::new(self.workers));

        tracing::info!(
            sources = self.registry.len(),
            workers = self.workers,
            "starting ingestion run"
        );

        let mut handles = Vec::with_capacity(self.registry.len());
        for source in self.registry.iter().cloned() {
            let pipeline = self.pipeline.clone();
            let store = self.store.clone();
            let semaphore = semaphore.clone();
            let upserted = upserted.clone();
            let fetch_timeout = self.fetch_timeout;

            let handle = tokio::spawn(async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => {
                        let result = ingest_source(
                            &pipeline,
                            &source,
                            store.as_ref(),
                            &upserted,
                            fetch_timeout,
                        )
                        .await;
                        match result {
                            Ok(stats) => SourceOutcome::Ingested {
                                entries: stats.entries,
                                upserted: stats.upserted,
                                dropped: stats.dropped,
                                persist_failed: stats.persist_failed,
                            },
                            Err(e) if e.is_source_failure() => {
                                tracing::warn!(
                                    source = %source.label,
                                    category = %source.category,
                                    "skipping source: {}",
                                    e
                                );
                                SourceOutcome::from_error(&e)
                            }
                            Err(e) => {
                                tracing::error!(
                                    source = %source.label,
                                    category = %source.category,
                                    "unexpected error: {}",
                                    e
                                );
                                SourceOutcome::from_error(&e)
                            }
                        }
                    }
                    Err(e) => SourceOutcome::FetchFailed {
                        reason: e.to_string(),
                    },
                };

                SourceReport {
                    label: source.label,
                    category: source.category,
                    outcome,
                }
            });

            handles.push(handle);
        }

        let mut sources = Vec::with_capacity(handles.len());
        for handle in futures::future::join_all(handles).await {
            match handle {
                Ok(report) => sources.push(report),
                Err(e) => {
                    return Err(NewsdeskError::Other(format!("source task aborted: {}", e)));
                }
            }
        }

        let summary = RunSummary {
            upserted: upserted.load(Ordering::SeqCst),
            sources,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            upserted = summary.upserted,
            failed_sources = summary.failed_sources(),
            elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
            "ingestion run completed"
        );

        Ok(summary)
    }
}

async fn ingest_source<S: Store>(
    pipeline: &Pipeline,
    source: &Source,
    store: &S,
    upserted: &AtomicUsize,
    fetch_timeout: Duration,
) -> Result<SourceStats> {
    let body = tokio::time::timeout(fetch_timeout, pipeline.fetcher.fetch(source))
        .await
        .map_err(|_| NewsdeskError::FetchFailed {
            label: source.label.clone(),
            category: source.category.clone(),
            reason: format!("no response within {}s", fetch_timeout.as_secs_f32()),
        })??;

    let entries = pipeline
        .parser
        .parse(&body)
        .map_err(|e| NewsdeskError::ParseFailed {
            label: source.label.clone(),
            category: source.category.clone(),
            reason: e.to_string(),
        })?;

    let mut stats = SourceStats {
        entries: entries.len(),
        ..SourceStats::default()
    };

    for entry in entries {
        let image_url = pipeline.resolver.resolve_with_tier(&entry).map(|(url, tier)| {
            tracing::trace!(source = %source.label, ?tier, %url, "resolved image");
            url
        });
        let Some(record) = pipeline.normalizer.normalize(entry, source, image_url) else {
            stats.dropped += 1;
            continue;
        };

        match store.upsert_record(&record) {
            Ok(()) => {
                stats.upserted += 1;
                upserted.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                stats.persist_failed += 1;
                tracing::warn!(source = %source.label, link = %record.link, "{}", e);
            }
        }
    }

    tracing::info!(
        source = %source.label,
        category = %source.category,
        entries = stats.entries,
        upserted = stats.upserted,
        dropped = stats.dropped,
        "ingested source"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use crate::domain::{NewsRecord, RecordFilter};
    use crate::store::SqliteStore;

    enum Canned {
        Body(String),
        Slow(Duration, String),
        Fail,
        Hang,
    }

    /// Serves canned bodies keyed by endpoint URL.
    struct FakeFetcher {
        responses: HashMap<String, Canned>,
    }

    impl FakeFetcher {
        fn new(responses: Vec<(&str, Canned)>) -> Arc<Self> {
            Arc::new(Self {
                responses: responses
                    .into_iter()
                    .map(|(url, canned)| (url.to_string(), canned))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, source: &Source) -> Result<Vec<u8>> {
            match self.responses.get(source.endpoint.as_str()) {
                Some(Canned::Body(body)) => Ok(body.clone().into_bytes()),
                Some(Canned::Slow(delay, body)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(body.clone().into_bytes())
                }
                Some(Canned::Hang) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                }
                Some(Canned::Fail) | None => Err(NewsdeskError::FetchFailed {
                    label: source.label.clone(),
                    category: source.category.clone(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    /// Rejects one link, delegates everything else.
    struct RejectingStore {
        inner: SqliteStore,
        rejected_link: String,
    }

    impl Store for RejectingStore {
        fn upsert_record(&self, record: &NewsRecord) -> Result<()> {
            if record.link == self.rejected_link {
                return Err(NewsdeskError::PersistFailed {
                    link: record.link.clone(),
                    reason: "constraint violation".into(),
                });
            }
            self.inner.upsert_record(record)
        }
        fn get_record(&self, link: &str) -> Result<Option<NewsRecord>> {
            self.inner.get_record(link)
        }
        fn count_records(&self) -> Result<usize> {
            self.inner.count_records()
        }
        fn list_records(&self, filter: &RecordFilter) -> Result<Vec<NewsRecord>> {
            self.inner.list_records(filter)
        }
        fn get_interests(&self, user_id: &str) -> Result<Vec<String>> {
            self.inner.get_interests(user_id)
        }
        fn set_interests(&self, user_id: &str, categories: &[String]) -> Result<()> {
            self.inner.set_interests(user_id, categories)
        }
    }

    fn rss(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/"><channel><title>Feed</title>{}</channel></rss>"#,
            items
        )
    }

    fn item(title: &str, link: &str) -> String {
        format!("<item><title>{}</title><link>{}</link></item>", title, link)
    }

    fn registry(sources: &[(&str, &str, &str)]) -> SourceRegistry {
        SourceRegistry::new(
            sources
                .iter()
                .map(|(category, endpoint, label)| Source::new(category, endpoint, label).unwrap())
                .collect(),
        )
    }

    fn ingestor<S: Store + Send + Sync + 'static>(
        sources: &[(&str, &str, &str)],
        fetcher: Arc<FakeFetcher>,
        store: Arc<S>,
    ) -> Ingestor<S> {
        Ingestor::new(registry(sources), fetcher, store)
    }

    #[tokio::test]
    async fn test_end_to_end_single_entry() {
        let fetcher = FakeFetcher::new(vec![(
            "https://e.example.com/rss",
            Canned::Body(rss(
                r#"<item><title>A</title><link>http://a</link><enclosure url="http://img/a.jpg" type="image/jpeg"/></item>"#,
            )),
        )]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&[("Tech", "https://e.example.com/rss", "X")], fetcher, store.clone());

        let summary = ingestor.run().await.unwrap();

        assert_eq!(summary.upserted, 1);
        assert_eq!(store.count_records().unwrap(), 1);
        let record = store.get_record("http://a").unwrap().unwrap();
        assert_eq!(record.title, "A");
        assert_eq!(record.link, "http://a");
        assert_eq!(record.image_url.as_deref(), Some("http://img/a.jpg"));
        assert_eq!(record.category, "Tech");
        assert_eq!(record.source, "X");
    }

    #[tokio::test]
    async fn test_second_run_does_not_duplicate() {
        let body = rss(&[item("A", "http://a"), item("B", "http://b")].concat());
        let fetcher = FakeFetcher::new(vec![("https://e.example.com/rss", Canned::Body(body))]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&[("Tech", "https://e.example.com/rss", "X")], fetcher, store.clone());

        ingestor.run().await.unwrap();
        let after_first = store.count_records().unwrap();
        let second = ingestor.run().await.unwrap();
        let after_second = store.count_records().unwrap();

        assert_eq!(after_first, 2);
        assert_eq!(after_second, after_first);
        assert_eq!(second.upserted, 2);
    }

    #[tokio::test]
    async fn test_failing_source_does_not_block_others() {
        let fetcher = FakeFetcher::new(vec![
            ("https://down.example.com/rss", Canned::Fail),
            (
                "https://up.example.com/rss",
                Canned::Body(rss(&item("A", "http://a"))),
            ),
        ]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(
            &[
                ("Spor", "https://down.example.com/rss", "Down"),
                ("Tech", "https://up.example.com/rss", "Up"),
            ],
            fetcher,
            store.clone(),
        );

        let summary = ingestor.run().await.unwrap();

        assert_eq!(summary.upserted, 1);
        assert_eq!(summary.failed_sources(), 1);
        assert_eq!(summary.sources[0].label, "Down");
        assert!(matches!(
            summary.sources[0].outcome,
            SourceOutcome::FetchFailed { .. }
        ));
        assert_eq!(summary.sources[0].outcome.upserted(), 0);
        assert_eq!(store.get_record("http://a").unwrap().unwrap().source, "Up");
        assert_eq!(ingestor.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_parse_failed_and_contained() {
        let fetcher = FakeFetcher::new(vec![
            (
                "https://html.example.com/rss",
                Canned::Body("<html><body>Access denied</body></html>".into()),
            ),
            (
                "https://ok.example.com/rss",
                Canned::Body(rss(&item("A", "http://a"))),
            ),
        ]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(
            &[
                ("Gündem", "https://html.example.com/rss", "Blocked"),
                ("Gündem", "https://ok.example.com/rss", "Fine"),
            ],
            fetcher,
            store.clone(),
        );

        let summary = ingestor.run().await.unwrap();

        assert!(matches!(
            summary.sources[0].outcome,
            SourceOutcome::ParseFailed { .. }
        ));
        assert_eq!(summary.upserted, 1);
        assert_eq!(store.count_records().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entries_missing_title_or_link_are_dropped() {
        let items = [
            "<item><link>http://no-title</link></item>".to_string(),
            item("Kept", "http://kept"),
            "<item><title>No link</title></item>".to_string(),
        ]
        .concat();
        let fetcher = FakeFetcher::new(vec![("https://e.example.com/rss", Canned::Body(rss(&items)))]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&[("Tech", "https://e.example.com/rss", "X")], fetcher, store.clone());

        let summary = ingestor.run().await.unwrap();

        assert_eq!(summary.upserted, 1);
        assert_eq!(summary.dropped(), 2);
        assert_eq!(summary.failed_sources(), 0);
        assert_eq!(store.count_records().unwrap(), 1);
        assert!(store.get_record("http://kept").unwrap().is_some());
        assert!(store.get_record("http://no-title").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_category_and_source_come_from_registry() {
        let items = r#"<item>
            <title>A</title><link>http://a</link>
            <category>Magazin</category>
            <source url="http://other">Other Paper</source>
        </item>"#;
        let fetcher = FakeFetcher::new(vec![("https://e.example.com/rss", Canned::Body(rss(items)))]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&[("Ekonomi", "https://e.example.com/rss", "NTV")], fetcher, store.clone());

        ingestor.run().await.unwrap();

        let record = store.get_record("http://a").unwrap().unwrap();
        assert_eq!(record.category, "Ekonomi");
        assert_eq!(record.source, "NTV");
    }

    #[tokio::test]
    async fn test_entry_without_date_gets_ingestion_time() {
        let fetcher = FakeFetcher::new(vec![(
            "https://e.example.com/rss",
            Canned::Body(rss(&item("A", "http://a"))),
        )]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&[("Tech", "https://e.example.com/rss", "X")], fetcher, store.clone());

        let before = Utc::now();
        ingestor.run().await.unwrap();
        let after = Utc::now();

        let created_at = store.get_record("http://a").unwrap().unwrap().created_at;
        assert!(created_at >= before - ChronoDuration::seconds(1));
        assert!(created_at <= after + ChronoDuration::seconds(1));
    }

    #[tokio::test]
    async fn test_persist_failure_only_loses_that_record() {
        let items = [item("A", "http://a"), item("B", "http://b"), item("C", "http://c")].concat();
        let fetcher = FakeFetcher::new(vec![("https://e.example.com/rss", Canned::Body(rss(&items)))]);
        let store = Arc::new(RejectingStore {
            inner: SqliteStore::in_memory().unwrap(),
            rejected_link: "http://b".into(),
        });
        let ingestor = ingestor(&[("Tech", "https://e.example.com/rss", "X")], fetcher, store.clone());

        let summary = ingestor.run().await.unwrap();

        assert_eq!(summary.upserted, 2);
        assert_eq!(summary.persist_failed(), 1);
        assert_eq!(summary.failed_sources(), 0);
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unresponsive_source_times_out() {
        let fetcher = FakeFetcher::new(vec![
            ("https://slow.example.com/rss", Canned::Hang),
            (
                "https://fast.example.com/rss",
                Canned::Body(rss(&item("A", "http://a"))),
            ),
        ]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(
            &[
                ("Tech", "https://slow.example.com/rss", "Slow"),
                ("Tech", "https://fast.example.com/rss", "Fast"),
            ],
            fetcher,
            store.clone(),
        )
        .with_fetch_timeout(Duration::from_millis(100));

        let summary = ingestor.run().await.unwrap();

        match &summary.sources[0].outcome {
            SourceOutcome::FetchFailed { reason } => assert!(reason.contains("no response")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(summary.upserted, 1);
    }

    #[tokio::test]
    async fn test_slow_source_within_bound_is_ingested() {
        let fetcher = FakeFetcher::new(vec![(
            "https://slow.example.com/rss",
            Canned::Slow(Duration::from_millis(300), rss(&item("A", "http://a"))),
        )]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&[("Tech", "https://slow.example.com/rss", "Slow")], fetcher, store)
            .with_fetch_timeout(Duration::from_secs(5));

        let summary = ingestor.run().await.unwrap();

        assert_eq!(summary.failed_sources(), 0);
        assert_eq!(summary.upserted, 1);
    }

    #[test]
    fn test_fetch_timeout_tracks_fetcher_timeout() {
        assert!(fetch_timeout_for(60) > Duration::from_secs(60));
        assert!(fetch_timeout_for(0) >= Duration::from_secs(1));
        assert_eq!(fetch_timeout_for(u64::MAX), Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn test_parallel_workers_count_every_upsert() {
        let endpoints: Vec<String> = (0..12)
            .map(|i| format!("https://feed{}.example.com/rss", i))
            .collect();
        let responses = endpoints
            .iter()
            .enumerate()
            .map(|(i, url)| {
                let items: String = (0..3)
                    .map(|j| item(&format!("T{}-{}", i, j), &format!("http://n/{}/{}", i, j)))
                    .collect();
                (url.as_str(), Canned::Body(rss(&items)))
            })
            .collect();
        let fetcher = FakeFetcher::new(responses);
        let sources: Vec<(&str, &str, &str)> =
            endpoints.iter().map(|url| ("Tech", url.as_str(), "X")).collect();
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&sources, fetcher, store.clone()).with_workers(3);

        let summary = ingestor.run().await.unwrap();

        assert_eq!(summary.upserted, 36);
        assert_eq!(summary.sources.len(), 12);
        assert_eq!(store.count_records().unwrap(), 36);
    }

    #[tokio::test]
    async fn test_run_states() {
        let fetcher = FakeFetcher::new(vec![]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&[], fetcher, store);

        assert_eq!(ingestor.state(), RunState::Idle);
        let summary = ingestor.run().await.unwrap();
        assert_eq!(summary.upserted, 0);
        assert_eq!(ingestor.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_image_precedence_through_pipeline() {
        let items = r#"
            <item><title>E</title><link>http://e</link>
              <enclosure url="http://img/enc.jpg"/>
              <media:content url="http://img/media.jpg"/>
              <description><![CDATA[<img src="http://img/src.jpg">]]></description></item>
            <item><title>M</title><link>http://m</link>
              <media:content url="http://img/media.jpg"/>
              <description><![CDATA[<img src="http://img/src.jpg">]]></description></item>
            <item><title>S</title><link>http://s</link>
              <description><![CDATA[<img src="http://img/src.jpg">]]></description></item>
            <item><title>N</title><link>http://n</link><description>plain</description></item>"#;
        let fetcher = FakeFetcher::new(vec![("https://e.example.com/rss", Canned::Body(rss(items)))]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = ingestor(&[("Tech", "https://e.example.com/rss", "X")], fetcher, store.clone());

        ingestor.run().await.unwrap();

        let image = |link: &str| store.get_record(link).unwrap().unwrap().image_url;
        assert_eq!(image("http://e").as_deref(), Some("http://img/enc.jpg"));
        assert_eq!(image("http://m").as_deref(), Some("http://img/media.jpg"));
        assert_eq!(image("http://s").as_deref(), Some("http://img/src.jpg"));
        assert_eq!(image("http://n"), None);
    }
}
