//! Market data module - aggregation service, configuration and traits.

mod market_data_constants;
mod market_data_model;
mod market_data_service;
mod market_data_traits;

#[cfg(test)]
mod market_data_service_tests;

// Re-export the public interface
pub use market_data_constants::*;
pub use market_data_model::{AggregatorConfig, CacheTtls, StalenessThresholds, StoreLookup};
pub use market_data_service::MarketDataService;
pub use market_data_traits::MarketDataServiceTrait;
