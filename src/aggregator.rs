use crate::collector::Collector;
use crate::rebalance::RebalanceStrategy;
use crate::traits::FetchFeed;
use crate::types::{CacheConfig, CacheStatus, CollectorConfig, FeedItem, FeedSource, FetchConfig};
use crate::Fetcher;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_ITEMS_PER_FEED: usize = 20;

/// Public query surface over the collector, consumed by the command/event
/// layer. One aggregator per deployment; the collector and its cache are
/// owned here rather than living in process-wide globals.
pub struct FeedAggregator {
    feeds: Vec<FeedSource>,
    items_per_feed: usize,
    collector: Collector,
}

impl FeedAggregator {
    pub fn new(
        feeds: Vec<FeedSource>,
        fetch_config: FetchConfig,
        cache_config: CacheConfig,
        collector_config: CollectorConfig,
    ) -> Self {
        let fetcher = Arc::new(Fetcher::new(fetch_config));
        Self::with_fetcher(feeds, fetcher, cache_config, collector_config)
    }

    /// Build over any fetch implementation. This is also the seam tests use
    /// to swap the network out.
    pub fn with_fetcher(
        feeds: Vec<FeedSource>,
        fetcher: Arc<dyn FetchFeed>,
        cache_config: CacheConfig,
        collector_config: CollectorConfig,
    ) -> Self {
        Self {
            feeds,
            items_per_feed: DEFAULT_ITEMS_PER_FEED,
            collector: Collector::new(fetcher, cache_config, collector_config),
        }
    }

    pub fn with_items_per_feed(mut self, items_per_feed: usize) -> Self {
        self.items_per_feed = items_per_feed;
        self
    }

    pub fn with_rebalance(mut self, strategy: RebalanceStrategy) -> Self {
        self.collector = self.collector.with_rebalance(strategy);
        self
    }

    /// All current items, newest first, optionally capped.
    pub async fn fetch_all(&self, limit: Option<usize>) -> Vec<FeedItem> {
        let mut items = self.collector.collect(&self.feeds, self.items_per_feed).await;
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        items
    }

    /// Items whose title, summary, or source contain `keyword`,
    /// case-insensitively. An empty or whitespace keyword returns the
    /// unfiltered (optionally capped) set.
    pub async fn search(&self, keyword: &str, limit: Option<usize>) -> Vec<FeedItem> {
        let keyword = keyword.trim();
        let mut items = self.fetch_all(None).await;

        if !keyword.is_empty() {
            let needle = keyword.to_lowercase();
            items.retain(|item| {
                item.title.to_lowercase().contains(&needle)
                    || item.summary.to_lowercase().contains(&needle)
                    || item.source.to_lowercase().contains(&needle)
            });
            debug!("Search for '{}' matched {} items", keyword, items.len());
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        items
    }

    /// Cache totals plus loading progress, for operational callers that need
    /// to distinguish "no data" from "loading in progress".
    pub async fn cache_status(&self) -> CacheStatus {
        self.collector.status().await
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }
}
