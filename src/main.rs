use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use feed_aggregator::{
    CacheConfig, CollectorConfig, FeedAggregator, FeedSource, FetchConfig, RebalanceStrategy,
};
use tracing::info;

/// Aggregate a handful of feeds once and print the merged snapshot.
#[derive(Parser, Debug)]
#[command(name = "feed-aggregator", about = "Fetch, merge, and query remote feeds")]
struct Args {
    /// Feed endpoints to aggregate (defaults to a small sample set).
    feeds: Vec<String>,

    /// Cap the number of items printed.
    #[arg(long)]
    limit: Option<usize>,

    /// Filter items by keyword across title, summary, and source.
    #[arg(long)]
    search: Option<String>,

    /// Cache TTL in minutes.
    #[arg(long, default_value_t = 10)]
    ttl_minutes: i64,

    /// Items to request from each feed.
    #[arg(long, default_value_t = 20)]
    items_per_feed: usize,
}

const SAMPLE_FEEDS: &[(&str, &str)] = &[
    ("BBC News", "https://feeds.bbci.co.uk/news/rss.xml"),
    ("CNN", "https://rss.cnn.com/rss/edition.rss"),
    ("NPR", "https://feeds.npr.org/1001/rss.xml"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let feeds = if args.feeds.is_empty() {
        SAMPLE_FEEDS
            .iter()
            .map(|(name, endpoint)| FeedSource::new(*name, *endpoint))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid sample feed")?
    } else {
        args.feeds
            .iter()
            .map(|endpoint| {
                let name = url::Url::parse(endpoint)
                    .ok()
                    .and_then(|u| u.domain().map(|d| d.to_string()))
                    .unwrap_or_else(|| endpoint.clone());
                FeedSource::new(name, endpoint.clone())
            })
            .collect::<Result<Vec<_>, _>>()
            .context("invalid feed endpoint")?
    };

    info!(feeds = feeds.len(), "starting aggregation");

    let aggregator = FeedAggregator::new(
        feeds,
        FetchConfig::default(),
        CacheConfig::with_ttl(Duration::minutes(args.ttl_minutes)),
        CollectorConfig {
            per_feed_budget: Some(std::time::Duration::from_secs(20)),
            ..CollectorConfig::default()
        },
    )
    .with_items_per_feed(args.items_per_feed)
    .with_rebalance(RebalanceStrategy::default());

    let items = match args.search.as_deref() {
        Some(keyword) => aggregator.search(keyword, args.limit).await,
        None => aggregator.fetch_all(args.limit).await,
    };

    if items.is_empty() {
        println!("No items available right now.");
    } else {
        for (index, item) in items.iter().enumerate() {
            let published = item
                .published_at
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_default();
            println!("{:>3}. [{}] {} ({})", index + 1, item.source, item.title, published);
            println!("     {}", item.link);
        }
    }

    let status = aggregator.cache_status().await;
    info!(
        total_cached = status.total_cached,
        cache_age_seconds = ?status.cache_age_seconds,
        "done"
    );

    Ok(())
}
