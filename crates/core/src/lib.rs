//! Cryptofolio Core - aggregation, caching and scheduling.
//!
//! This crate sits between the provider layer (`cryptofolio-market-data`)
//! and its consumers. It is storage-agnostic and defines the `MarketStore`
//! trait that persistence backends implement.

pub mod cache;
pub mod errors;
pub mod insights;
pub mod market_data;
pub mod scheduler;
pub mod store;

// Re-export the main entry points
pub use cache::{CacheKey, CachedPayload, TtlCache};
pub use market_data::{AggregatorConfig, MarketDataService, MarketDataServiceTrait};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState};
pub use store::{InMemoryMarketStore, MarketStore, SnapshotQuery};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
