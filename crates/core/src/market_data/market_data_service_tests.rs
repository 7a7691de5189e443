use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use cryptofolio_market_data::errors::MarketDataError;
use cryptofolio_market_data::{
    AssetDetail, GlobalSnapshot, HistoricalSeries, MarketDataProvider, MarketItem, PricePoint,
    ProviderRegistry, RegistryConfig,
};

use super::{MarketDataService, MarketDataServiceTrait};
use crate::errors::Error;
use crate::store::{InMemoryMarketStore, MarketStore, SnapshotQuery};

struct StubProvider {
    id: &'static str,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StubProvider {
    fn new(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn enter(&self) -> Result<(), MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MarketDataError::Unreachable {
                provider: self.id.to_string(),
                message: "down".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn fetch_snapshot(
        &self,
        currency: &str,
        _limit: u32,
    ) -> Result<Vec<MarketItem>, MarketDataError> {
        self.enter()?;
        Ok(vec![
            MarketItem::new("bitcoin", "BTC", "Bitcoin", currency, dec!(64000), Utc::now(), self.id)
                .with_rank(1),
            MarketItem::new("ethereum", "ETH", "Ethereum", currency, dec!(3000), Utc::now(), self.id)
                .with_rank(2),
        ])
    }

    async fn fetch_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        self.enter()?;
        let mut detail = AssetDetail::new(id, "BTC", "Bitcoin", Utc::now(), self.id);
        detail
            .market_data
            .current_price
            .insert("usd".to_string(), dec!(64000));
        Ok(detail)
    }

    async fn fetch_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries, MarketDataError> {
        self.enter()?;
        let now = Utc::now();
        let prices = vec![
            PricePoint::new(now - Duration::days(1), dec!(63000)),
            PricePoint::new(now, dec!(64000)),
        ];
        Ok(HistoricalSeries::new(id, currency, days, prices, now, self.id))
    }

    async fn fetch_global(&self) -> Result<GlobalSnapshot, MarketDataError> {
        self.enter()?;
        let mut global = GlobalSnapshot::new(Utc::now(), self.id);
        global.active_cryptocurrencies = 10_000;
        global
            .total_market_cap
            .insert("usd".to_string(), dec!(2500000000000));
        Ok(global)
    }
}

fn service_with(provider: Arc<StubProvider>) -> (MarketDataService, Arc<InMemoryMarketStore>) {
    let providers: Vec<Arc<dyn MarketDataProvider>> = vec![provider];
    let registry = ProviderRegistry::with_config(providers, RegistryConfig::default());
    let store = Arc::new(InMemoryMarketStore::new());
    let service = MarketDataService::new(Arc::new(registry), store.clone());
    (service, store)
}

#[tokio::test]
async fn test_repeated_detail_within_ttl_hits_provider_once() {
    let provider = StubProvider::new("STUB");
    let (service, _store) = service_with(provider.clone());

    for _ in 0..5 {
        let detail = service.get_asset_detail("bitcoin").await.unwrap();
        assert_eq!(detail.source, "STUB");
    }

    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_fresh_store_record_skips_providers() {
    let provider = StubProvider::new("STUB");
    let (service, store) = service_with(provider.clone());

    let mut stored = AssetDetail::new("bitcoin", "BTC", "Bitcoin", Utc::now(), "STORED");
    stored
        .market_data
        .current_price
        .insert("usd".to_string(), dec!(1));
    store.save_detail(&stored).await.unwrap();

    let detail = service.get_asset_detail("bitcoin").await.unwrap();
    assert_eq!(detail.source, "STORED");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_stale_global_goes_live() {
    let provider = StubProvider::new("STUB");
    let (service, store) = service_with(provider.clone());

    let old = GlobalSnapshot::new(Utc::now() - Duration::hours(2), "STORED");
    store.save_global(&old).await.unwrap();

    let global = service.get_global_snapshot().await.unwrap();
    assert_eq!(global.source, "STUB");
    assert_eq!(provider.calls(), 1);

    service.flush().await;
    let persisted = store.get_global().await.unwrap().unwrap();
    assert_eq!(persisted.source, "STUB");
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let provider = StubProvider::new("STUB");
    provider.set_failing(true);
    let (service, _store) = service_with(provider.clone());

    let err = service.get_global_snapshot().await.unwrap_err();
    assert!(matches!(
        err,
        Error::MarketData(MarketDataError::AllProvidersFailed { .. })
    ));

    provider.set_failing(false);
    let global = service.get_global_snapshot().await.unwrap();
    assert_eq!(global.source, "STUB");
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_live_snapshot_is_persisted_and_cached() {
    let provider = StubProvider::new("STUB");
    let (service, store) = service_with(provider.clone());

    let items = service
        .get_market_snapshot("USD", 100, 1, None)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    // Same request, different spelling of the currency: cache hit.
    service
        .get_market_snapshot("usd", 100, 1, None)
        .await
        .unwrap();
    assert_eq!(provider.calls(), 1);

    service.flush().await;
    let rows = store
        .get_snapshot(&SnapshotQuery::new("usd", 0, 0))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_live_snapshot_honours_ids() {
    let provider = StubProvider::new("STUB");
    let (service, _store) = service_with(provider);

    let ids = vec!["ethereum".to_string()];
    let items = service
        .get_market_snapshot("usd", 100, 1, Some(&ids))
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "ethereum");
}

#[tokio::test]
async fn test_refresh_always_goes_live() {
    let provider = StubProvider::new("STUB");
    let (service, _store) = service_with(provider.clone());

    service.get_historical_series("bitcoin", "usd", 7).await.unwrap();
    service.refresh_historical_series("bitcoin", "usd", 7).await.unwrap();
    service.get_historical_series("bitcoin", "usd", 7).await.unwrap();

    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_store_served_snapshot_pages_by_rank() {
    let provider = StubProvider::new("STUB");
    let (service, store) = service_with(provider.clone());

    store
        .save_snapshot(&[
            MarketItem::new("ethereum", "ETH", "Ethereum", "usd", dec!(1), Utc::now(), "STORED")
                .with_rank(2),
            MarketItem::new("bitcoin", "BTC", "Bitcoin", "usd", dec!(1), Utc::now(), "STORED")
                .with_rank(1),
        ])
        .await
        .unwrap();

    let page = service.get_market_snapshot("usd", 1, 2, None).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, "ethereum");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_shutdown_applies_pending_writes() {
    let provider = StubProvider::new("STUB");
    let (service, store) = service_with(provider.clone());

    service.get_global_snapshot().await.unwrap();
    service.shutdown().await;
    assert!(store.get_global().await.unwrap().is_some());

    // Still serves reads, but stops persisting.
    service.refresh_asset_detail("bitcoin").await.unwrap();
    assert!(store.get_detail("bitcoin").await.unwrap().is_none());

    service.shutdown().await;
}

#[tokio::test]
async fn test_unknown_ids_are_an_error_and_not_cached() {
    let provider = StubProvider::new("STUB");
    let (service, _store) = service_with(provider.clone());

    let ids = vec!["polkadot".to_string()];
    for _ in 0..2 {
        let err = service
            .get_market_snapshot("usd", 100, 1, Some(&ids))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MarketData(MarketDataError::NoData { .. })
        ));
    }

    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_partial_id_match_is_returned_but_not_cached() {
    let provider = StubProvider::new("STUB");
    let (service, _store) = service_with(provider.clone());

    let ids = vec!["bitcoin".to_string(), "polkadot".to_string()];
    for _ in 0..2 {
        let items = service
            .get_market_snapshot("usd", 100, 1, Some(&ids))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "bitcoin");
    }

    assert_eq!(provider.calls(), 2);
}
