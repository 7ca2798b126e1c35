use crate::types::{AggregatorError, FeedItem, Result};
use chrono::Utc;
use feed_rs::parser;
use tracing::debug;

/// Maps raw feed documents (RSS or Atom) to normalized items.
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a feed document body into normalized items attributed to
    /// `source_name`. Entries without a usable link are dropped here; they
    /// cannot be ordered or deduplicated downstream.
    pub fn parse(&self, source_name: &str, body: &[u8]) -> Result<Vec<FeedItem>> {
        let feed = parser::parse(body)
            .map_err(|e| AggregatorError::Parse(format!("failed to parse feed: {}", e)))?;

        let total = feed.entries.len();
        let items: Vec<FeedItem> = feed
            .entries
            .into_iter()
            .filter_map(|entry| Self::map_entry(source_name, entry))
            .collect();

        if items.len() < total {
            debug!(
                "Dropped {} entries without a usable link from {}",
                total - items.len(),
                source_name
            );
        }

        Ok(items)
    }

    fn map_entry(source_name: &str, entry: feed_rs::model::Entry) -> Option<FeedItem> {
        let link = entry.links.first()?.href.clone();
        if link.is_empty() {
            return None;
        }

        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());

        // RSS carries pubDate, Atom often only updated; take whichever resolves.
        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        let summary = entry.summary.map(|s| s.content).unwrap_or_default();

        Some(FeedItem {
            title,
            link,
            published_at,
            source: source_name.to_string(),
            summary,
        })
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}
