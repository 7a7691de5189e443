//! In-process caching.
//!
//! - [`TtlCache`] - generic expiring key/value store with a background sweep
//! - [`CacheKey`] / [`CachedPayload`] - what the aggregation service caches

mod keys;
mod ttl_cache;

pub use keys::{CacheKey, CachedPayload};
pub use ttl_cache::{TtlCache, DEFAULT_SWEEP_INTERVAL};
