use crate::traits::FetchFeed;
use crate::types::{AggregatorError, FeedPull, FeedSource, FetchConfig, Result};
use crate::FeedParser;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Retrieves and normalizes one feed's content, owning the per-feed
/// retry/backoff policy. Never mutates the cache; the collector decides
/// what to keep.
pub struct Fetcher {
    client: Client,
    parser: FeedParser,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            parser: FeedParser::new(),
            config,
        }
    }

    /// Deterministic retry schedule: delay before attempt i+1 doubles from
    /// the base and is capped, with no jitter.
    pub fn retry_schedule(config: &FetchConfig) -> ExponentialBackoff<backoff::SystemClock> {
        ExponentialBackoff {
            current_interval: Duration::from_millis(config.retry_base_delay_ms),
            initial_interval: Duration::from_millis(config.retry_base_delay_ms),
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: Duration::from_millis(config.retry_max_delay_ms),
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Fetch up to `desired` items. Transient network failures are retried
    /// with backoff; anything else degrades immediately to an empty pull.
    /// This never returns an error to the caller.
    pub async fn fetch(&self, source: &FeedSource, desired: usize) -> FeedPull {
        let mut backoff = Self::retry_schedule(&self.config);

        for attempt in 1..=self.config.max_attempts {
            let started = Instant::now();
            match self.fetch_once(source, desired).await {
                Ok(pull) => {
                    info!(
                        "Fetched {}: {} of {} items in {}ms (attempt {})",
                        source.name,
                        pull.items.len(),
                        pull.available,
                        started.elapsed().as_millis(),
                        attempt
                    );
                    return pull;
                }
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| Duration::from_millis(self.config.retry_max_delay_ms));
                    warn!(
                        "Transient error fetching {} after {}ms (attempt {}): {}, retrying in {}ms",
                        source.name,
                        started.elapsed().as_millis(),
                        attempt,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        "Failed to fetch {} after {}ms (attempt {}): {}, returning empty result",
                        source.name,
                        started.elapsed().as_millis(),
                        attempt,
                        err
                    );
                    return FeedPull::empty();
                }
            }
        }

        FeedPull::empty()
    }

    async fn fetch_once(&self, source: &FeedSource, desired: usize) -> Result<FeedPull> {
        if self.config.probe_before_fetch {
            self.probe(source).await?;
        }

        let response = self.client.get(&source.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::Status {
                status: status.as_u16(),
                url: source.endpoint.clone(),
            });
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(AggregatorError::Parse("empty response body".to_string()));
        }

        let mut items = self.parser.parse(&source.name, &body)?;
        let available = items.len();
        items.truncate(desired);

        Ok(FeedPull {
            items,
            available,
            success: true,
        })
    }

    /// Pre-flight reachability check. An unreachable endpoint fails fast
    /// before the GET is attempted; a reachable endpoint that rejects HEAD
    /// is ignored, since plenty of feed servers do.
    async fn probe(&self, source: &FeedSource) -> Result<()> {
        let response = self.client.head(&source.endpoint).send().await?;
        debug!(
            "Pre-flight probe for {}: HTTP {}",
            source.name,
            response.status().as_u16()
        );
        Ok(())
    }
}

#[async_trait]
impl FetchFeed for Fetcher {
    async fn fetch(&self, source: &FeedSource, desired: usize) -> FeedPull {
        Fetcher::fetch(self, source, desired).await
    }
}
