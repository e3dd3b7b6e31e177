pub mod entry;
pub mod record;
pub mod source;

pub use entry::FeedEntry;
pub use record::{NewsRecord, RecordFilter, DEFAULT_LIST_LIMIT};
pub use source::Source;
