use std::time::Duration;

/// Cache TTLs per record kind
pub const SNAPSHOT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DETAIL_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
pub const HISTORY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const GLOBAL_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Age past which a stored record no longer counts as a store hit
pub const SNAPSHOT_STALE_AFTER: Duration = Duration::from_secs(15 * 60);
pub const DETAIL_STALE_AFTER: Duration = Duration::from_secs(60 * 60);
pub const HISTORY_STALE_AFTER: Duration = Duration::from_secs(60 * 60);
pub const GLOBAL_STALE_AFTER: Duration = Duration::from_secs(60 * 60);
