use crate::cache::FeedCache;
use crate::rebalance::RebalanceStrategy;
use crate::traits::FetchFeed;
use crate::types::{
    CacheConfig, CacheStatus, CollectionStats, CollectorConfig, FeedItem, FeedPull, FeedSource,
    WaitPolicy,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Whether an aggregation pass is currently in flight. One per collector;
/// callers observing `is_loading` must not start a second pass.
#[derive(Debug, Default, Clone)]
pub struct LoadingState {
    pub is_loading: bool,
    pub started_at: Option<DateTime<Utc>>,
}

/// Resets the loading state when dropped, so the reset holds on every exit
/// path out of a pass, including panics inside a fetch.
struct LoadingGuard<'a> {
    state: &'a StdMutex<LoadingState>,
}

impl<'a> LoadingGuard<'a> {
    fn engage(state: &'a StdMutex<LoadingState>) -> Self {
        let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
        s.is_loading = true;
        s.started_at = Some(Utc::now());
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        s.is_loading = false;
        s.started_at = None;
    }
}

/// Orchestrates one collection pass: cache consultation, concurrent fetching
/// of the misses, merge, sort, dedup, and the optional shortfall rebalance.
/// A pass lock collapses concurrent requests into a single fetch wave.
pub struct Collector {
    fetcher: Arc<dyn FetchFeed>,
    cache: Mutex<FeedCache>,
    loading: StdMutex<LoadingState>,
    pass_lock: Mutex<()>,
    config: CollectorConfig,
    rebalance: Option<RebalanceStrategy>,
}

impl Collector {
    pub fn new(
        fetcher: Arc<dyn FetchFeed>,
        cache_config: CacheConfig,
        config: CollectorConfig,
    ) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(FeedCache::new(cache_config)),
            loading: StdMutex::new(LoadingState::default()),
            pass_lock: Mutex::new(()),
            config,
            rebalance: None,
        }
    }

    /// Enable shortfall rebalancing after each pass.
    pub fn with_rebalance(mut self, strategy: RebalanceStrategy) -> Self {
        self.rebalance = Some(strategy);
        self
    }

    /// Collect up to `per_feed` items from every feed, deduplicated by link
    /// and sorted newest first. A total outage of sources yields an empty
    /// vec, not an error.
    ///
    /// At most one pass runs at a time. A caller arriving mid-pass either
    /// returns empty or waits, per the configured policy; either way it never
    /// triggers overlapping fetches for the same feed.
    pub async fn collect(&self, feeds: &[FeedSource], per_feed: usize) -> Vec<FeedItem> {
        let _pass = match self.config.wait_policy {
            WaitPolicy::ReturnEmpty => match self.pass_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!("Collection pass already in flight, returning empty");
                    return Vec::new();
                }
            },
            WaitPolicy::Wait { max_wait } => {
                match tokio::time::timeout(max_wait, self.pass_lock.lock()).await {
                    Ok(guard) => guard,
                    Err(_) => {
                        warn!(
                            "Gave up waiting on in-flight pass after {}s, serving cached items",
                            max_wait.as_secs()
                        );
                        return finalize(self.cache.lock().await.get_all());
                    }
                }
            }
        };

        let _loading = LoadingGuard::engage(&self.loading);
        self.collect_inner(feeds, per_feed).await
    }

    async fn collect_inner(&self, feeds: &[FeedSource], per_feed: usize) -> Vec<FeedItem> {
        let pass_id = Uuid::new_v4();
        let mut collected: Vec<FeedItem> = Vec::new();
        let mut misses: Vec<&FeedSource> = Vec::new();

        {
            let mut cache = self.cache.lock().await;
            for feed in feeds {
                match cache.get(&feed.endpoint) {
                    Some(entry) => {
                        debug!(
                            "Cache hit for {}: {} items (pass {})",
                            feed.name,
                            entry.items.len(),
                            pass_id
                        );
                        collected.extend(entry.items.iter().cloned());
                    }
                    None => misses.push(feed),
                }
            }
        }

        let mut stats: HashMap<String, CollectionStats> = HashMap::new();
        if !misses.is_empty() {
            debug!("Fetching {} uncached feeds (pass {})", misses.len(), pass_id);
            let pulls = join_all(
                misses
                    .iter()
                    .map(|feed| self.fetch_bounded(feed, per_feed)),
            )
            .await;

            let mut cache = self.cache.lock().await;
            for (feed, pull) in misses.iter().zip(pulls) {
                if pull.success {
                    stats.insert(
                        feed.endpoint.clone(),
                        CollectionStats {
                            requested: per_feed,
                            original_available: pull.available,
                            returned: pull.items.len(),
                        },
                    );
                    cache.set(&feed.endpoint, pull.items.clone());
                }
                collected.extend(pull.items);
            }
        }

        let mut result = finalize(collected);

        if let Some(strategy) = &self.rebalance {
            result = self
                .rebalance_pass(strategy, feeds, per_feed, &stats, result)
                .await;
        }

        info!("Collection pass {} complete: {} items", pass_id, result.len());
        result
    }

    /// One compensation round: re-fetch only the surplus feeds at a raised
    /// target and merge in whatever links are new. The result set never
    /// shrinks here.
    async fn rebalance_pass(
        &self,
        strategy: &RebalanceStrategy,
        feeds: &[FeedSource],
        per_feed: usize,
        stats: &HashMap<String, CollectionStats>,
        mut result: Vec<FeedItem>,
    ) -> Vec<FeedItem> {
        let Some(plan) = strategy.plan(stats) else {
            return result;
        };

        let targets: Vec<&FeedSource> = feeds
            .iter()
            .filter(|feed| plan.targets.contains(&feed.endpoint))
            .collect();
        info!(
            "Rebalancing shortfall: requesting {} extra items from each of {} surplus feeds",
            plan.extra_per_feed,
            targets.len()
        );

        let raised = per_feed + plan.extra_per_feed;
        let pulls = join_all(targets.iter().map(|feed| self.fetch_bounded(feed, raised))).await;

        let mut seen: HashSet<String> = result.iter().map(|item| item.link.clone()).collect();
        let mut extras: Vec<FeedItem> = Vec::new();
        {
            let mut cache = self.cache.lock().await;
            for (feed, pull) in targets.iter().zip(pulls) {
                if pull.success {
                    cache.set(&feed.endpoint, pull.items.clone());
                }
                for item in pull.items {
                    if item.published_at.is_some() && seen.insert(item.link.clone()) {
                        extras.push(item);
                    }
                }
            }
        }

        if extras.is_empty() {
            return result;
        }

        debug!("Rebalance extended the collection by {} items", extras.len());
        result.extend(extras);
        result.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        result
    }

    async fn fetch_bounded(&self, feed: &FeedSource, desired: usize) -> FeedPull {
        match self.config.per_feed_budget {
            Some(budget) => {
                match tokio::time::timeout(budget, self.fetcher.fetch(feed, desired)).await {
                    Ok(pull) => pull,
                    Err(_) => {
                        warn!(
                            "Feed {} exceeded the {}ms collection budget, contributing nothing",
                            feed.name,
                            budget.as_millis()
                        );
                        FeedPull::empty()
                    }
                }
            }
            None => self.fetcher.fetch(feed, desired).await,
        }
    }

    /// Point-in-time snapshot of the cache and loading state.
    pub async fn status(&self) -> CacheStatus {
        let (per_feed_counts, cache_age_seconds) = {
            let cache = self.cache.lock().await;
            let counts = cache.per_key_counts();
            let age = cache
                .newest_insertion()
                .map(|t| Utc::now().signed_duration_since(t).num_seconds());
            (counts, age)
        };

        let (is_loading, loading_elapsed_seconds) = {
            let state = self.loading.lock().unwrap_or_else(PoisonError::into_inner);
            (
                state.is_loading,
                state
                    .started_at
                    .map(|t| Utc::now().signed_duration_since(t).num_seconds()),
            )
        };

        CacheStatus {
            total_cached: per_feed_counts.values().sum(),
            per_feed_counts,
            is_loading,
            loading_elapsed_seconds,
            cache_age_seconds,
        }
    }

    /// Current loading state, for callers that poll.
    pub fn loading_state(&self) -> LoadingState {
        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Imposes the output contract on a merged batch: undated items are dropped,
/// the rest are sorted newest first (stable, so ties keep input order), and
/// duplicate links keep their first, best-sorted occurrence.
fn finalize(mut items: Vec<FeedItem>) -> Vec<FeedItem> {
    items.retain(|item| item.published_at.is_some());
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let mut seen: HashSet<String> = HashSet::new();
    items.retain(|item| seen.insert(item.link.clone()));
    items
}
