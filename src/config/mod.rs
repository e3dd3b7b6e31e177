//! Configuration management for Newsdesk.
//!
//! Configuration is read from `~/.config/newsdesk/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod registry;

pub use registry::{default_source_entries, SourceEntry, SourceRegistry, DEFAULT_SOURCES};

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app::NewsdeskError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_WORKERS: usize = 4;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub store: StoreConfig,
    pub sources: Vec<SourceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            store: StoreConfig::default(),
            sources: default_source_entries(),
        }
    }
}

/// HTTP and scheduling settings for feed retrieval.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Browser-like identity sent to upstream feeds
    pub user_agent: String,
    /// Maximum sources fetched concurrently
    pub workers: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; defaults to `<data dir>/newsdesk/newsdesk.db`
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// At the default location a commented default file is created when
    /// missing. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::default_config_path()?;
                if !default_path.exists() {
                    Self::create_default_config(&default_path)?;
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        Self::parse(&content, &config_path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        if config.fetcher.workers == 0 {
            return Err(ConfigError::Invalid(
                "fetcher.workers must be at least 1".into(),
            ));
        }

        Ok(config)
    }

    /// Validate the `[[sources]]` tables into a registry.
    pub fn registry(&self) -> Result<SourceRegistry, ConfigError> {
        SourceRegistry::from_entries(&self.sources)
    }

    /// Get the default config file path: `~/.config/newsdesk/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("newsdesk").join("config.toml"))
    }

    /// Get the default database path, creating its directory.
    pub fn default_db_path() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        let newsdesk_dir = data_dir.join("newsdesk");
        fs::create_dir_all(&newsdesk_dir).map_err(|e| ConfigError::Io {
            path: newsdesk_dir.clone(),
            source: e,
        })?;
        Ok(newsdesk_dir.join("newsdesk.db"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        let mut content = format!(
            r##"# Newsdesk Configuration
#
# Each [[sources]] table is one feed to ingest. `category` and `label` are
# copied onto every record the feed produces; the feed's own category fields
# are ignored.

[fetcher]
# Per-request timeout in seconds
timeout_secs = {timeout}

# Identity sent to upstream feeds (some block non-browser clients)
user_agent = "{user_agent}"

# Number of sources fetched concurrently
workers = {workers}

[store]
# Database file (default: <data dir>/newsdesk/newsdesk.db)
# path = "/var/lib/newsdesk/newsdesk.db"
"##,
            timeout = DEFAULT_TIMEOUT_SECS,
            user_agent = DEFAULT_USER_AGENT,
            workers = DEFAULT_WORKERS,
        );

        for (category, endpoint, label) in DEFAULT_SOURCES {
            content.push_str(&format!(
                "\n[[sources]]\ncategory = \"{}\"\nendpoint = \"{}\"\nlabel = \"{}\"\n",
                category, endpoint, label
            ));
        }

        content
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid source #{index}: {reason}")]
    InvalidSource { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for NewsdeskError {
    fn from(e: ConfigError) -> Self {
        NewsdeskError::Config(e.to_string())
    }
}
