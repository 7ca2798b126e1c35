use crate::types::{FeedPull, FeedSource};
use async_trait::async_trait;

/// Seam between the collector and the network. The collector only ever sees
/// pulls, never errors; a failed fetch surfaces as an empty pull.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    /// Retrieve up to `desired` normalized items from one feed.
    async fn fetch(&self, source: &FeedSource, desired: usize) -> FeedPull;
}
