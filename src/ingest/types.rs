// src/ingest/types.rs
use icalendar::Event;

use crate::config::SourceFeed;
use crate::error::FetchError;

/// Retrieves one upstream feed as an ordered event list.
///
/// Any error is fatal to the merge cycle that asked for it.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, feed: &SourceFeed) -> Result<Vec<Event>, FetchError>;
}
