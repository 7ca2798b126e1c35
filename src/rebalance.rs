use crate::types::CollectionStats;
use std::collections::HashMap;
use tracing::debug;

/// Shortfall compensation heuristic. When some feeds genuinely had fewer
/// items upstream than requested, feeds with comfortable headroom are asked
/// for more to make up the difference.
///
/// The deficit is approximated, not measured: each underperformer is assumed
/// to be short by `requested - typical_deficit` items. Best-effort only; the
/// caller never shrinks its result because of this, and runs at most one
/// pass per cycle.
#[derive(Debug, Clone)]
pub struct RebalanceStrategy {
    /// Assumed per-feed deficit floor; an underperformer is treated as
    /// missing `requested - typical_deficit` items.
    pub typical_deficit: usize,
    /// A feed overperforms when it has at least `headroom_factor * requested`
    /// items available upstream.
    pub headroom_factor: usize,
}

impl Default for RebalanceStrategy {
    fn default() -> Self {
        Self {
            typical_deficit: 10,
            headroom_factor: 2,
        }
    }
}

/// Output of one planning round: which feeds to re-fetch and how many extra
/// items to ask each for.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalancePlan {
    pub extra_per_feed: usize,
    /// Endpoints of the overperforming feeds to re-fetch.
    pub targets: Vec<String>,
}

impl RebalanceStrategy {
    /// Decide whether this cycle warrants a compensation pass. `stats` holds
    /// telemetry for successfully fetched feeds only, so fetch failures never
    /// count as underperformers.
    pub fn plan(&self, stats: &HashMap<String, CollectionStats>) -> Option<RebalancePlan> {
        let underperformers: Vec<&CollectionStats> = stats
            .values()
            .filter(|s| s.returned < s.requested && s.original_available < s.requested)
            .collect();

        let targets: Vec<String> = stats
            .iter()
            .filter(|(_, s)| s.original_available >= self.headroom_factor * s.requested)
            .map(|(endpoint, _)| endpoint.clone())
            .collect();

        if underperformers.is_empty() || targets.is_empty() {
            return None;
        }

        let requested = underperformers[0].requested;
        let shortfall = underperformers.len() * requested.saturating_sub(self.typical_deficit);
        if shortfall == 0 {
            return None;
        }

        let extra_per_feed = shortfall.div_ceil(targets.len());
        debug!(
            "Planned rebalance: {} underperformers, {} surplus feeds, shortfall {}, {} extra per feed",
            underperformers.len(),
            targets.len(),
            shortfall,
            extra_per_feed
        );

        Some(RebalancePlan {
            extra_per_feed,
            targets,
        })
    }
}
