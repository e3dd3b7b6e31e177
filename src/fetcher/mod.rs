pub mod http_fetcher;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::Source;

pub use http_fetcher::HttpFetcher;

/// Retrieves the raw feed document of one source.
///
/// Implementations report every failure as
/// [`NewsdeskError::FetchFailed`](crate::app::NewsdeskError::FetchFailed)
/// carrying the source's label and category.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<u8>>;
}
