//! Typed cache keys and payloads for the aggregation service.

use cryptofolio_market_data::{
    normalize_currency, AssetDetail, GlobalSnapshot, HistoricalSeries, MarketItem,
};

use crate::store::normalize_ids;

/// Cache key: operation plus its full, order-normalized parameter tuple.
///
/// Build keys through the constructors so equivalent requests always map to
/// the same entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Snapshot {
        currency: String,
        limit: u32,
        page: u32,
        /// Sorted and de-duplicated.
        ids: Vec<String>,
    },
    Detail {
        id: String,
    },
    History {
        id: String,
        currency: String,
        days: u32,
    },
    Global,
}

impl CacheKey {
    pub fn snapshot(currency: &str, limit: u32, page: u32, ids: &[String]) -> Self {
        CacheKey::Snapshot {
            currency: normalize_currency(currency),
            limit,
            page,
            ids: normalize_ids(ids),
        }
    }

    pub fn detail(id: &str) -> Self {
        CacheKey::Detail {
            id: id.trim().to_string(),
        }
    }

    pub fn history(id: &str, currency: &str, days: u32) -> Self {
        CacheKey::History {
            id: id.trim().to_string(),
            currency: normalize_currency(currency),
            days,
        }
    }

    /// Operation name, for log lines.
    pub fn operation(&self) -> &'static str {
        match self {
            CacheKey::Snapshot { .. } => "snapshot",
            CacheKey::Detail { .. } => "detail",
            CacheKey::History { .. } => "history",
            CacheKey::Global => "global",
        }
    }
}

/// Value stored in the aggregation cache.
#[derive(Clone, Debug)]
pub enum CachedPayload {
    Snapshot(Vec<MarketItem>),
    Detail(AssetDetail),
    History(HistoricalSeries),
    Global(GlobalSnapshot),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key_normalizes_ids_and_currency() {
        let a = CacheKey::snapshot(
            "USD",
            100,
            1,
            &["ethereum".to_string(), "bitcoin".to_string(), "ethereum".to_string()],
        );
        let b = CacheKey::snapshot(" usd ", 100, 1, &["bitcoin".to_string(), "ethereum".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_parameters_do_not_collide() {
        assert_ne!(
            CacheKey::snapshot("usd", 100, 1, &[]),
            CacheKey::snapshot("usd", 100, 2, &[])
        );
        assert_ne!(
            CacheKey::history("bitcoin", "usd", 7),
            CacheKey::history("bitcoin", "usd", 30)
        );
        assert_ne!(CacheKey::detail("bitcoin"), CacheKey::detail("ethereum"));
    }
}
