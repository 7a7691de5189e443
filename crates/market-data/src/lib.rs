//! Cryptofolio Market Data Crate
//!
//! This crate fetches cryptocurrency market data from several independent
//! upstream sources and normalizes it into one set of records.
//!
//! # Overview
//!
//! - Market snapshots, asset details, price histories and global totals
//! - Three providers: CoinGecko, CryptoCompare, CoinMarketCap
//! - Fan-out-merge for snapshots, ordered fallback for everything else
//! - Per-attempt deadlines and circuit breaking
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! | ProviderRegistry |  (ordering, fallback, fan-out)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  CircuitBreaker  | --> |    Provider      |  (CoinGecko, CryptoCompare, ...)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          | PayloadValidator |
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  Domain records  |  (MarketItem, AssetDetail, ...)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketItem`] - One row of a market snapshot
//! - [`AssetDetail`] - Full profile of a single asset
//! - [`HistoricalSeries`] - Price history over a trailing window
//! - [`GlobalSnapshot`] - Market-wide totals
//! - [`MarketDataError`] - Typed provider and registry failures

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{MarketDataError, RetryClass};

// Re-export all public types from models
pub use models::{
    normalize_currency, AssetDetail, AssetId, AssetLinks, AssetMarketData, Currency, CurrencyMap,
    GlobalSnapshot, HistoricalSeries, MarketItem, PricePoint, ProviderId,
};

// Re-export provider types
pub use provider::coingecko::CoinGeckoProvider;
pub use provider::coinmarketcap::CoinMarketCapProvider;
pub use provider::cryptocompare::CryptoCompareProvider;
pub use provider::MarketDataProvider;

// Re-export registry types
pub use registry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStatus, FetchDiagnostics,
    ProviderAttempt, ProviderRegistry, RegistryConfig, SkipReason, ValidationSeverity,
    ValidatorConfig,
};
