//! End-to-end aggregation through `MarketDataService`.

mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use common::{service, total_calls, Mode, StubProvider};
use cryptofolio_core::{Error, MarketDataServiceTrait, MarketStore, SnapshotQuery};
use cryptofolio_market_data::errors::MarketDataError;
use cryptofolio_market_data::{AssetDetail, GlobalSnapshot};

#[tokio::test]
async fn test_detail_falls_back_in_order() {
    let a = StubProvider::new("A", Mode::Down);
    let b = StubProvider::new("B", Mode::Healthy);
    let c = StubProvider::new("C", Mode::Healthy);
    let (service, _store) = service(&[a.clone(), b.clone(), c.clone()]);

    let detail = service.get_asset_detail("bitcoin").await.unwrap();

    assert_eq!(detail.source, "B");
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(c.calls(), 0);
}

#[tokio::test]
async fn test_empty_answer_falls_through_to_next_provider() {
    let a = StubProvider::new("A", Mode::Empty);
    let b = StubProvider::new("B", Mode::Healthy);
    let (service, _store) = service(&[a.clone(), b.clone()]);

    let series = service.get_historical_series("bitcoin", "usd", 7).await.unwrap();

    assert_eq!(series.source, "B");
    assert_eq!(series.prices.len(), 2);
}

#[tokio::test]
async fn test_snapshot_merges_every_successful_provider() {
    let a = StubProvider::with_items("A", 3);
    let b = StubProvider::new("B", Mode::Down);
    let c = StubProvider::with_items("C", 2);
    let (service, store) = service(&[a.clone(), b.clone(), c.clone()]);

    let items = service.get_market_snapshot("usd", 50, 1, None).await.unwrap();

    assert_eq!(items.len(), 5);
    assert_eq!(items.iter().filter(|i| i.source == "A").count(), 3);
    assert_eq!(items.iter().filter(|i| i.source == "C").count(), 2);
    assert_eq!(total_calls(&[a, b, c]), 3);

    service.flush().await;
    let rows = store.get_snapshot(&SnapshotQuery::new("usd", 0, 0)).await.unwrap();
    assert_eq!(rows.len(), 5);
}

#[tokio::test]
async fn test_all_providers_failing_reports_each_attempt() {
    let a = StubProvider::new("A", Mode::Down);
    let b = StubProvider::new("B", Mode::Empty);
    let (service, _store) = service(&[a, b]);

    let err = service.get_global_snapshot().await.unwrap_err();

    match err {
        Error::MarketData(MarketDataError::AllProvidersFailed { attempts }) => {
            assert!(attempts.contains("A: ERROR"), "{}", attempts);
            assert!(attempts.contains("No data from B"), "{}", attempts);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_snapshot_with_no_successful_provider_fails() {
    let a = StubProvider::new("A", Mode::Down);
    let b = StubProvider::new("B", Mode::Down);
    let (service, _store) = service(&[a, b]);

    let err = service
        .get_market_snapshot("usd", 10, 1, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MarketData(MarketDataError::AllProvidersFailed { .. })
    ));
}

#[tokio::test]
async fn test_store_keeps_the_newer_detail() {
    let (_service, store) = service(&[]);
    let t0 = Utc::now() - Duration::minutes(10);
    let t1 = Utc::now();

    let mut newer = AssetDetail::new("bitcoin", "BTC", "Bitcoin", t1, "NEW");
    newer.market_data.current_price.insert("usd".to_string(), dec!(2));
    let mut older = AssetDetail::new("bitcoin", "BTC", "Bitcoin", t0, "OLD");
    older.market_data.current_price.insert("usd".to_string(), dec!(1));

    assert!(store.save_detail(&newer).await.unwrap());
    assert!(!store.save_detail(&older).await.unwrap());

    let kept = store.get_detail("bitcoin").await.unwrap().unwrap();
    assert_eq!(kept.source, "NEW");
    assert_eq!(kept.last_updated, t1);
}

#[tokio::test]
async fn test_stale_global_is_refetched_and_replaced() {
    let a = StubProvider::new("A", Mode::Healthy);
    let (service, store) = service(&[a.clone()]);

    let mut stale = GlobalSnapshot::new(Utc::now() - Duration::hours(3), "STORED");
    stale.active_cryptocurrencies = 1;
    store.save_global(&stale).await.unwrap();

    let global = service.get_global_snapshot().await.unwrap();
    assert_eq!(global.source, "A");
    assert_eq!(a.calls(), 1);

    service.flush().await;
    let stored = store.get_global().await.unwrap().unwrap();
    assert_eq!(stored.source, "A");
}

#[tokio::test]
async fn test_repeated_reads_are_idempotent() {
    let a = StubProvider::new("A", Mode::Healthy);
    let (service, _store) = service(&[a.clone()]);

    let first = service.get_global_snapshot().await.unwrap();
    let second = service.get_global_snapshot().await.unwrap();
    let series_1 = service.get_historical_series("bitcoin", "USD", 7).await.unwrap();
    let series_2 = service.get_historical_series("bitcoin", "usd", 7).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(series_1, series_2);
    assert_eq!(a.calls(), 2);
}
