pub mod sqlite;

use crate::app::Result;
use crate::domain::{NewsRecord, RecordFilter};

pub use sqlite::SqliteStore;

/// Persistence for canonical records plus the per-user interest list.
///
/// Implementations must be safe to call from several ingestion tasks at once.
pub trait Store {
    // Record operations
    /// Insert or overwrite the record keyed by its `link`.
    fn upsert_record(&self, record: &NewsRecord) -> Result<()>;
    fn get_record(&self, link: &str) -> Result<Option<NewsRecord>>;
    fn count_records(&self) -> Result<usize>;
    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<NewsRecord>>;

    // Preference operations
    fn get_interests(&self, user_id: &str) -> Result<Vec<String>>;
    fn set_interests(&self, user_id: &str, categories: &[String]) -> Result<()>;
}
