use crate::types::{CacheConfig, FeedItem};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// One cached feed's items plus when they were written.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub items: Vec<FeedItem>,
    pub inserted_at: DateTime<Utc>,
}

/// In-memory TTL store keyed by feed endpoint. Expiry is a pure function of
/// wall-clock time: an entry past its TTL is never returned, whether or not
/// anything was written since. Eviction is lazy, on read.
pub struct FeedCache {
    entries: HashMap<String, CacheEntry>,
    config: CacheConfig,
}

impl FeedCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        Utc::now().signed_duration_since(entry.inserted_at) > self.config.ttl
    }

    /// Returns the entry for `key`, or `None` when missing or expired.
    /// Expired entries are dropped on the way out.
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        let expired = self
            .entries
            .get(key)
            .map(|entry| self.is_expired(entry))
            .unwrap_or(false);
        if expired {
            debug!("Evicting expired cache entry for {}", key);
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key)
    }

    /// Overwrites the entry for `key`, stamping it with the current time.
    pub fn set(&mut self, key: &str, items: Vec<FeedItem>) {
        debug!("Caching {} items for {}", items.len(), key);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                items,
                inserted_at: Utc::now(),
            },
        );
    }

    /// Concatenates all unexpired entries, deleting expired ones met during
    /// the scan.
    pub fn get_all(&mut self) -> Vec<FeedItem> {
        self.sweep();
        self.entries
            .values()
            .flat_map(|entry| entry.items.iter().cloned())
            .collect()
    }

    /// Drops every expired entry. Optional; `get`/`get_all` never return
    /// stale data without it.
    pub fn sweep(&mut self) {
        let before = self.entries.len();
        let ttl = self.config.ttl;
        let now = Utc::now();
        self.entries
            .retain(|_, entry| now.signed_duration_since(entry.inserted_at) <= ttl);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Swept {} expired cache entries", evicted);
        }
    }

    /// Timestamp of the most recent unexpired write.
    pub fn newest_insertion(&self) -> Option<DateTime<Utc>> {
        self.entries
            .values()
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.inserted_at)
            .max()
    }

    /// Item counts per key, unexpired entries only.
    pub fn per_key_counts(&self) -> HashMap<String, usize> {
        self.entries
            .iter()
            .filter(|(_, entry)| !self.is_expired(entry))
            .map(|(key, entry)| (key.clone(), entry.items.len()))
            .collect()
    }

    /// Raw entry count, including any not-yet-evicted expired entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
