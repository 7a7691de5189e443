//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Concrete provider implementations (CoinGecko, CryptoCompare, CoinMarketCap)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The registry only sees the trait, never the source
//! - **Extensible**: New providers can be added by implementing `MarketDataProvider`
//! - **Resilient**: Circuit breakers and per-attempt deadlines live in the registry
//!
//! Every provider tags the records it produces with its own id as `source`,
//! and returns a typed `MarketDataError` instead of a partial record.

mod http;
mod traits;

pub mod coingecko;
pub mod coinmarketcap;
pub mod cryptocompare;

pub use traits::MarketDataProvider;
