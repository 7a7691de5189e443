//! Property-based tests for the TTL cache and the store's overwrite-if-newer
//! merge.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use cryptofolio_core::store::{InMemoryMarketStore, MarketStore};
use cryptofolio_core::TtlCache;
use cryptofolio_market_data::AssetDetail;

// =============================================================================
// Generators
// =============================================================================

/// Cache operations: (key, value) puts.
fn arb_puts() -> impl Strategy<Value = Vec<(u8, u32)>> {
    proptest::collection::vec((0u8..16, any::<u32>()), 0..64)
}

/// Save timestamps in seconds since the epoch, in arbitrary order.
fn arb_save_times() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(1_600_000_000i64..1_800_000_000, 1..20)
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A get right after a put returns what was put, and the last put wins.
    #[test]
    fn prop_get_returns_last_put(puts in arb_puts()) {
        let cache = TtlCache::new();
        let mut expected = HashMap::new();

        for (key, value) in puts {
            cache.put(key, value, Duration::from_secs(60));
            prop_assert_eq!(cache.get(&key), Some(value));
            expected.insert(key, value);
        }

        prop_assert_eq!(cache.len(), expected.len());
        for (key, value) in expected {
            prop_assert_eq!(cache.get(&key), Some(value));
        }
    }

    /// Nothing expires within its TTL, so a sweep removes nothing.
    #[test]
    fn prop_sweep_keeps_live_entries(puts in arb_puts()) {
        let cache = TtlCache::new();
        for (key, value) in &puts {
            cache.put(*key, *value, Duration::from_secs(60));
        }
        let before = cache.len();
        prop_assert_eq!(cache.purge_expired(), 0);
        prop_assert_eq!(cache.len(), before);
    }

    /// Whatever order the writes arrive in, the store keeps the newest.
    #[test]
    fn prop_store_keeps_newest_detail(times in arb_save_times()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let store = InMemoryMarketStore::new();

        runtime.block_on(async {
            for (i, secs) in times.iter().enumerate() {
                let at = Utc.timestamp_opt(*secs, 0).unwrap();
                let detail = AssetDetail::new("bitcoin", "BTC", "Bitcoin", at, format!("SRC{}", i));
                store.save_detail(&detail).await.unwrap();
            }
        });

        let stored = runtime
            .block_on(store.get_detail("bitcoin"))
            .unwrap()
            .unwrap();
        let newest = times.iter().max().copied().unwrap();
        prop_assert_eq!(stored.last_updated.timestamp(), newest);
    }
}

#[test]
fn test_get_after_ttl_is_missing() {
    let cache = TtlCache::new();
    cache.put("bitcoin", 1u32, Duration::from_millis(20));
    assert_eq!(cache.get(&"bitcoin"), Some(1));

    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(cache.get(&"bitcoin"), None);
}
