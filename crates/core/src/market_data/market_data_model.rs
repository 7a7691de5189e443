//! Aggregation service configuration and lookup outcomes.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::market_data_constants::*;
use crate::store::DEFAULT_PERSIST_CAPACITY;

/// How long a freshly filled cache entry lives, per record kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheTtls {
    pub snapshot: Duration,
    pub detail: Duration,
    pub history: Duration,
    pub global: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            snapshot: SNAPSHOT_CACHE_TTL,
            detail: DETAIL_CACHE_TTL,
            history: HISTORY_CACHE_TTL,
            global: GLOBAL_CACHE_TTL,
        }
    }
}

/// Maximum age of a stored record that still counts as a hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StalenessThresholds {
    pub snapshot: Duration,
    pub detail: Duration,
    pub history: Duration,
    pub global: Duration,
}

impl Default for StalenessThresholds {
    fn default() -> Self {
        Self {
            snapshot: SNAPSHOT_STALE_AFTER,
            detail: DETAIL_STALE_AFTER,
            history: HISTORY_STALE_AFTER,
            global: GLOBAL_STALE_AFTER,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub cache_ttls: CacheTtls,
    pub staleness: StalenessThresholds,
    /// Capacity of the write-behind queue.
    pub persist_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_ttls: CacheTtls::default(),
            staleness: StalenessThresholds::default(),
            persist_capacity: DEFAULT_PERSIST_CAPACITY,
        }
    }
}

/// Outcome of a store read. Only `Fresh` short-circuits a live fetch.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreLookup<T> {
    Fresh(T),
    Stale { age: Duration },
    Missing,
}

impl<T> StoreLookup<T> {
    /// Classify a stored record by the age of `updated_at`.
    ///
    /// Timestamps in the future count as age zero.
    pub fn classify(
        record: Option<T>,
        updated_at: impl Fn(&T) -> DateTime<Utc>,
        max_age: Duration,
    ) -> Self {
        let Some(record) = record else {
            return StoreLookup::Missing;
        };
        let age = (Utc::now() - updated_at(&record))
            .to_std()
            .unwrap_or_default();
        if age > max_age {
            StoreLookup::Stale { age }
        } else {
            StoreLookup::Fresh(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let now = Utc::now();
        let hour = Duration::from_secs(3600);
        let stamped = |at: DateTime<Utc>| Some((1, at));
        let at = |r: &(i32, DateTime<Utc>)| r.1;

        assert!(matches!(
            StoreLookup::classify(stamped(now), at, hour),
            StoreLookup::Fresh((1, _))
        ));
        assert!(matches!(
            StoreLookup::classify(stamped(now - chrono::Duration::hours(2)), at, hour),
            StoreLookup::Stale { .. }
        ));
        assert!(matches!(
            StoreLookup::classify(None, at, hour),
            StoreLookup::Missing
        ));
        assert!(matches!(
            StoreLookup::classify(stamped(now + chrono::Duration::minutes(5)), at, hour),
            StoreLookup::Fresh(_)
        ));
    }
}
