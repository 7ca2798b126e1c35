use async_trait::async_trait;
use chrono::{Duration, Utc};
use feed_aggregator::{
    CacheConfig, CollectorConfig, FeedAggregator, FeedItem, FeedPull, FeedSource, FetchFeed,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const FEED_ENDPOINT: &str = "https://newswire.example.com/rss.xml";

struct SingleFeedStub {
    items: Vec<FeedItem>,
    calls: AtomicUsize,
}

#[async_trait]
impl FetchFeed for SingleFeedStub {
    async fn fetch(&self, _source: &FeedSource, desired: usize) -> FeedPull {
        self.calls.fetch_add(1, Ordering::SeqCst);
        FeedPull {
            items: self.items.iter().take(desired).cloned().collect(),
            available: self.items.len(),
            success: true,
        }
    }
}

/// Fifty dated items; numbers 7, 21, and 33 mention AI in the title.
fn wire_items() -> Vec<FeedItem> {
    (0..50)
        .map(|n| {
            let title = if n == 7 || n == 21 || n == 33 {
                format!("AI breakthrough {}", n)
            } else {
                format!("Story {}", n)
            };
            FeedItem {
                title,
                link: format!("https://newswire.example.com/{}", n),
                published_at: Some(Utc::now() - Duration::minutes(n)),
                source: "newswire".to_string(),
                summary: format!("wire summary {}", n),
            }
        })
        .collect()
}

fn build() -> (Arc<SingleFeedStub>, FeedAggregator) {
    let feed = FeedSource::new("newswire", FEED_ENDPOINT).unwrap();
    let stub = Arc::new(SingleFeedStub {
        items: wire_items(),
        calls: AtomicUsize::new(0),
    });
    let aggregator = FeedAggregator::with_fetcher(
        vec![feed],
        stub.clone(),
        CacheConfig::default(),
        CollectorConfig::default(),
    )
    .with_items_per_feed(50);
    (stub, aggregator)
}

#[tokio::test]
async fn search_returns_only_matches_regardless_of_limit() {
    let (_, aggregator) = build();

    let results = aggregator.search("AI", Some(5)).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|i| i.title.contains("AI")));
}

#[tokio::test]
async fn search_is_case_insensitive() {
    let (_, aggregator) = build();

    let lower = aggregator.search("ai breakthrough", None).await;
    assert_eq!(lower.len(), 3);
}

#[tokio::test]
async fn search_matches_source_names_and_caps() {
    let (_, aggregator) = build();

    // Every item carries the source name, so the limit does the capping.
    let results = aggregator.search("newswire", Some(5)).await;
    assert_eq!(results.len(), 5);
}

#[tokio::test]
async fn blank_keyword_returns_the_capped_set() {
    let (_, aggregator) = build();

    let results = aggregator.search("   ", Some(10)).await;
    assert_eq!(results.len(), 10);

    let unlimited = aggregator.search("", None).await;
    assert_eq!(unlimited.len(), 50);
}

#[tokio::test]
async fn fetch_all_caps_to_limit() {
    let (_, aggregator) = build();

    assert_eq!(aggregator.fetch_all(Some(5)).await.len(), 5);
    assert_eq!(aggregator.fetch_all(None).await.len(), 50);
}

#[tokio::test]
async fn repeated_queries_are_served_from_cache() {
    let (stub, aggregator) = build();

    aggregator.fetch_all(None).await;
    aggregator.search("AI", None).await;
    aggregator.fetch_all(Some(3)).await;

    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_status_reflects_the_store() {
    let (_, aggregator) = build();

    let before = aggregator.cache_status().await;
    assert_eq!(before.total_cached, 0);
    assert!(before.cache_age_seconds.is_none());
    assert!(!before.is_loading);

    aggregator.fetch_all(None).await;

    let after = aggregator.cache_status().await;
    assert_eq!(after.total_cached, 50);
    assert_eq!(after.per_feed_counts.get(FEED_ENDPOINT), Some(&50));
    assert!(!after.is_loading);
    assert!(after.loading_elapsed_seconds.is_none());
    let age = after.cache_age_seconds.expect("one write recorded");
    assert!((0..=1).contains(&age));
}
