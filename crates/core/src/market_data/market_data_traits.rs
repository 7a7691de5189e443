use async_trait::async_trait;

use cryptofolio_market_data::{AssetDetail, GlobalSnapshot, HistoricalSeries, MarketItem};

use crate::errors::Result;

/// Read-through market data access.
///
/// `get_*` answer from the cache, then the store, then the providers.
/// `refresh_*` always go to the providers and refill store and cache.
#[async_trait]
pub trait MarketDataServiceTrait: Send + Sync {
    async fn get_market_snapshot(
        &self,
        currency: &str,
        limit: u32,
        page: u32,
        ids: Option<&[String]>,
    ) -> Result<Vec<MarketItem>>;
    async fn get_asset_detail(&self, id: &str) -> Result<AssetDetail>;
    async fn get_historical_series(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries>;
    async fn get_global_snapshot(&self) -> Result<GlobalSnapshot>;

    async fn refresh_market_snapshot(&self, currency: &str, limit: u32) -> Result<Vec<MarketItem>>;
    async fn refresh_asset_detail(&self, id: &str) -> Result<AssetDetail>;
    async fn refresh_historical_series(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries>;
    async fn refresh_global_snapshot(&self) -> Result<GlobalSnapshot>;
}
