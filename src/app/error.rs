use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewsdeskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Network, HTTP status or timeout failure for one source.
    #[error("Fetch failed for {label} ({category}): {reason}")]
    FetchFailed {
        label: String,
        category: String,
        reason: String,
    },

    /// Payload of one source could not be decoded as any supported feed dialect.
    #[error("Parse failed for {label} ({category}): {reason}")]
    ParseFailed {
        label: String,
        category: String,
        reason: String,
    },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Persist failed for {link}: {reason}")]
    PersistFailed { link: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl NewsdeskError {
    /// True for failures contained at the single-source boundary.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::ParseFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, NewsdeskError>;
