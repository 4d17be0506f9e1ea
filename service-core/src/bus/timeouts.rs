//! Named timeout tiers for bus calls.
//!
//! Callers pick a tier by what the call does; the gateway itself does not care
//! which one is used.

use std::time::Duration;

/// Single-item lookups and pings.
pub const QUICK: Duration = Duration::from_millis(5_000);
/// Everything without a more specific tier.
pub const DEFAULT: Duration = Duration::from_millis(15_000);
/// Paginated list queries.
pub const LIST_QUERY: Duration = Duration::from_millis(30_000);
/// Aggregates and dashboards.
pub const ANALYTICS: Duration = Duration::from_millis(30_000);
/// Batch generation jobs.
pub const BULK_OPERATION: Duration = Duration::from_millis(120_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutTier {
    Quick,
    Default,
    ListQuery,
    Analytics,
    BulkOperation,
}

impl TimeoutTier {
    pub const fn duration(self) -> Duration {
        match self {
            TimeoutTier::Quick => QUICK,
            TimeoutTier::Default => DEFAULT,
            TimeoutTier::ListQuery => LIST_QUERY,
            TimeoutTier::Analytics => ANALYTICS,
            TimeoutTier::BulkOperation => BULK_OPERATION,
        }
    }
}

impl From<TimeoutTier> for Duration {
    fn from(tier: TimeoutTier) -> Self {
        tier.duration()
    }
}
