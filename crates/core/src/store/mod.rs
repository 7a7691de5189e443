//! Market data persistence.
//!
//! - `traits` - The `MarketStore` interface and snapshot query parameters
//! - `memory` - In-memory store used by the daemon and tests
//! - `persist` - Bounded write-behind worker feeding a store

mod memory;
mod persist;
mod traits;

pub use memory::InMemoryMarketStore;
pub use persist::{PersistJob, PersistQueue, DEFAULT_PERSIST_CAPACITY};
pub use traits::{normalize_ids, MarketStore, SnapshotQuery, DEFAULT_SNAPSHOT_LIMIT};
