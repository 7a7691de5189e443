//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{AssetDetail, GlobalSnapshot, HistoricalSeries, MarketItem};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new upstream source. Every
/// capability has a default implementation returning `NotSupported`, so a
/// provider only overrides what its source can actually serve. How the
/// data is extracted (JSON API, page scraping) is private to the provider.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use cryptofolio_market_data::provider::MarketDataProvider;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     async fn fetch_global(&self) -> Result<GlobalSnapshot, MarketDataError> {
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "COINGECKO". Used as the `source`
    /// tag on records, for logging and for circuit breaker tracking.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    /// Only used when the registry has no explicit priority order for
    /// this provider.
    fn priority(&self) -> u8 {
        10
    }

    /// Fetch the top `limit` assets by market cap, priced in `currency`.
    ///
    /// # Arguments
    ///
    /// * `currency` - Lower-cased quote currency (e.g. "usd")
    /// * `limit` - Maximum number of rows to return
    async fn fetch_snapshot(
        &self,
        currency: &str,
        limit: u32,
    ) -> Result<Vec<MarketItem>, MarketDataError> {
        let _ = (currency, limit);
        Err(MarketDataError::not_supported(self.id(), "snapshot"))
    }

    /// Fetch the full profile of one asset.
    async fn fetch_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        let _ = id;
        Err(MarketDataError::not_supported(self.id(), "detail"))
    }

    /// Fetch the price history of one asset.
    ///
    /// # Arguments
    ///
    /// * `id` - Asset identifier (e.g. "bitcoin")
    /// * `currency` - Lower-cased quote currency
    /// * `days` - Trailing window length in days
    ///
    /// # Returns
    ///
    /// The series, ordered by timestamp ascending.
    async fn fetch_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let _ = (id, currency, days);
        Err(MarketDataError::not_supported(self.id(), "history"))
    }

    /// Fetch market-wide totals.
    async fn fetch_global(&self) -> Result<GlobalSnapshot, MarketDataError> {
        Err(MarketDataError::not_supported(self.id(), "global"))
    }
}
