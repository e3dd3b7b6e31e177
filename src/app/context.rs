use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::error::Result;
use crate::config::{Config, SourceRegistry};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::ingest::{fetch_timeout_for, Ingestor, RunReport};
use crate::store::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub ingestor: Ingestor<SqliteStore>,
}

impl AppContext {
    /// Load the config file, open the database and wire up the ingestor.
    ///
    /// The database path is taken from `db_path`, then `[store] path`, then the
    /// per-user data directory. `workers` overrides `[fetcher] workers`.
    pub fn new(
        config_path: Option<&Path>,
        db_path: Option<PathBuf>,
        workers: Option<usize>,
    ) -> Result<Self> {
        let config = Config::load(config_path)?;

        let db_path = match db_path.or_else(|| config.store.path.clone()) {
            Some(p) => p,
            None => Config::default_db_path()?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Arc::new(SqliteStore::new(&db_path)?);
        tracing::debug!(db = %db_path.display(), "opened store");

        Self::with_store(config, store, workers)
    }

    /// Same wiring over an in-memory database.
    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store, None)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>, workers: Option<usize>) -> Result<Self> {
        let registry = config.registry()?;
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(&config.fetcher)?);
        let workers = workers.unwrap_or(config.fetcher.workers);

        let ingestor = Ingestor::new(registry, fetcher, store.clone())
            .with_workers(workers)
            .with_fetch_timeout(fetch_timeout_for(config.fetcher.timeout_secs));

        Ok(Self {
            config,
            store,
            ingestor,
        })
    }

    pub fn registry(&self) -> &SourceRegistry {
        self.ingestor.registry()
    }

    /// Run ingestion once and shape the outcome as a trigger response.
    pub async fn run_ingestion(&self) -> RunReport {
        RunReport::from_result(&self.ingestor.run().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SOURCES;
    use crate::store::Store;

    #[test]
    fn test_in_memory_context_uses_config_sources() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        assert_eq!(ctx.registry().len(), DEFAULT_SOURCES.len());
        assert_eq!(ctx.store.count_records().unwrap(), 0);
    }

    #[test]
    fn test_new_creates_database_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let db_path = dir.path().join("data").join("news.db");
        std::fs::write(
            &config_path,
            format!(
                "[store]\npath = {:?}\n\n[[sources]]\ncategory = \"Tech\"\nendpoint = \"https://example.com/rss\"\nlabel = \"X\"\n",
                db_path.to_string_lossy()
            ),
        )
        .unwrap();

        let ctx = AppContext::new(Some(&config_path), None, Some(2)).unwrap();

        assert!(db_path.exists());
        assert_eq!(ctx.registry().len(), 1);
    }

    #[test]
    fn test_invalid_source_fails_context() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[[sources]]\ncategory = \"Tech\"\nendpoint = \"ftp://example.com/rss\"\nlabel = \"X\"\n",
        )
        .unwrap();

        let result = AppContext::new(Some(&config_path), Some(dir.path().join("n.db")), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_configured_timeout_bounds_each_source() {
        let mut config = Config::default();
        config.fetcher.timeout_secs = 60;
        let ctx = AppContext::in_memory(config).unwrap();

        let timeout = ctx.ingestor.fetch_timeout();
        assert!(timeout > std::time::Duration::from_secs(60));
        assert_eq!(timeout, fetch_timeout_for(60));

        let mut short = Config::default();
        short.fetcher.timeout_secs = 5;
        let ctx = AppContext::in_memory(short).unwrap();
        assert!(ctx.ingestor.fetch_timeout() < std::time::Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_run_with_no_sources_reports_success() {
        let config = Config {
            sources: Vec::new(),
            ..Config::default()
        };
        let ctx = AppContext::in_memory(config).unwrap();

        let report = ctx.run_ingestion().await;
        assert!(report.success);
        assert_eq!(report.upserted, Some(0));
    }
}
