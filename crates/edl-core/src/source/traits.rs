use crate::error::Result;
use crate::types::IndicatorPage;
use async_trait::async_trait;

/// The external indicator database an EDL is built from.
///
/// Implementations run a filter `query` and return one page of matches.
/// Pages are zero-based and `size` indicators long; a page shorter than
/// `size` is the last one. A query the store cannot parse is reported as
/// [`EdlError::Fetch`](crate::EdlError::Fetch).
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    /// Fetch page `page` of the indicators matching `query`.
    async fn find_indicators(&self, query: &str, page: usize, size: usize) -> Result<IndicatorPage>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "indicator-source"
    }
}

