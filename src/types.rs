use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A remote feed to aggregate. Identity is the endpoint string; the name is
/// what downstream consumers see as the item source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub endpoint: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let parsed = url::Url::parse(&endpoint)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AggregatorError::General(format!(
                "unsupported feed scheme: {}",
                parsed.scheme()
            )));
        }
        Ok(Self {
            name: name.into(),
            endpoint,
        })
    }
}

/// A feed entry after normalization. The link doubles as the deduplication
/// key, so entries without one are dropped during parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub summary: String,
}

/// Outcome of one feed fetch. `available` is the entry count of the parsed
/// document before truncation to the requested amount; `success` is false
/// when the fetch degraded to an empty result.
#[derive(Debug, Clone, Default)]
pub struct FeedPull {
    pub items: Vec<FeedItem>,
    pub available: usize,
    pub success: bool,
}

impl FeedPull {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Per-feed telemetry for one collection cycle, consumed only by the
/// shortfall rebalancer. Recorded only for feeds that fetched successfully.
#[derive(Debug, Clone, Copy)]
pub struct CollectionStats {
    pub requested: usize,
    pub original_available: usize,
    pub returned: usize,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Total attempts per fetch, including the first one.
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_redirects: usize,
    /// Issue a HEAD probe before the GET. Latency optimization only; fetch
    /// results are identical with or without it.
    pub probe_before_fetch: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Feed-Aggregator/1.0".to_string(),
            timeout_seconds: 30,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            max_redirects: 5,
            probe_before_fetch: false,
        }
    }
}

/// TTL configuration for the cache. One mechanism, two observed profiles.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl CacheConfig {
    /// Standard profile for caching raw per-feed item lists.
    pub fn per_feed() -> Self {
        Self {
            ttl: Duration::minutes(10),
        }
    }

    /// Coarser profile for caching an already-merged aggregate.
    pub fn aggregate() -> Self {
        Self {
            ttl: Duration::minutes(30),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::per_feed()
    }
}

/// What a caller gets when it enters `collect` while a pass is already in
/// flight.
#[derive(Debug, Clone, Copy)]
pub enum WaitPolicy {
    /// Return an empty result immediately; the caller retries shortly.
    ReturnEmpty,
    /// Block until the in-flight pass completes, up to `max_wait`, then give
    /// up and return whatever the cache holds.
    Wait { max_wait: std::time::Duration },
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub wait_policy: WaitPolicy,
    /// Upper bound on any single feed fetch within a pass; a feed exceeding
    /// it contributes an empty result instead of stalling the batch.
    pub per_feed_budget: Option<std::time::Duration>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            wait_policy: WaitPolicy::Wait {
                max_wait: std::time::Duration::from_secs(60),
            },
            per_feed_budget: None,
        }
    }
}

/// Snapshot of cache and loading state for operational callers.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub total_cached: usize,
    pub per_feed_counts: HashMap<String, usize>,
    pub is_loading: bool,
    pub loading_elapsed_seconds: Option<i64>,
    /// Seconds since the most recent successful cache write.
    pub cache_age_seconds: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

impl AggregatorError {
    /// Whether a retry could plausibly succeed: connection reset, timeout,
    /// DNS failure, refusal, or a hang-up mid-response. Malformed documents
    /// and HTTP error statuses are final.
    pub fn is_transient(&self) -> bool {
        let err = match self {
            AggregatorError::Http(err) => err,
            _ => return false,
        };
        if err.is_timeout() || err.is_connect() {
            return true;
        }
        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            if let Some(io) = inner.downcast_ref::<std::io::Error>() {
                if matches!(
                    io.kind(),
                    std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionRefused
                        | std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::NotConnected
                        | std::io::ErrorKind::BrokenPipe
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::UnexpectedEof
                ) {
                    return true;
                }
            }
            let text = inner.to_string().to_lowercase();
            if text.contains("connection reset")
                || text.contains("connection closed")
                || text.contains("incomplete message")
                || text.contains("dns error")
                || text.contains("timed out")
            {
                return true;
            }
            source = inner.source();
        }
        false
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
