//! Generic expiring key/value cache.
//!
//! Reads expire lazily: an entry past its deadline is reported as missing
//! but stays in the map until the next sweep. Writes and sweeps take the
//! exclusive lock; reads share it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shortest TTL an entry can be given.
const MIN_TTL: Duration = Duration::from_millis(1);

/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe TTL cache.
///
/// Every operation is total: a poisoned lock is recovered rather than
/// propagated, so callers never see a cache failure.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Insert or overwrite `key`, expiring `ttl` from now.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl.max(MIN_TTL);
        self.write().insert(key, CacheEntry { value, expires_at });
    }

    /// Returns the value if present and not yet expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.read()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    pub fn delete(&self, key: &K) {
        self.write().remove(key);
    }

    /// Physical entry count, expired-but-unswept entries included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Start the periodic sweep on the tokio runtime.
    ///
    /// The loop ends once `shutdown` turns `true` or its sender is dropped.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_TTL));
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            debug!("Cache sweep removed {} expired entries", removed);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Cache sweeper stopped");
        })
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_put() {
        let cache = TtlCache::new();
        cache.put("btc", 1, Duration::from_secs(60));
        assert_eq!(cache.get(&"btc"), Some(1));
        assert_eq!(cache.get(&"eth"), None);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = TtlCache::new();
        cache.put("btc", 1, Duration::from_secs(60));
        cache.put("btc", 2, Duration::from_secs(60));
        assert_eq!(cache.get(&"btc"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_missing_but_not_removed() {
        let cache = TtlCache::new();
        cache.put("btc", 1, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.get(&"btc"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_is_clamped() {
        let cache = TtlCache::new();
        cache.put("btc", 1, Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"btc"), None);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = TtlCache::new();
        cache.put("btc", 1, Duration::from_secs(60));
        cache.put("eth", 2, Duration::from_secs(60));

        cache.delete(&"btc");
        assert_eq!(cache.get(&"btc"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired_keeps_live_entries() {
        let cache = TtlCache::new();
        cache.put("short", 1, Duration::from_millis(10));
        cache.put("long", 2, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"long"), Some(2));
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_and_stops() {
        let cache = Arc::new(TtlCache::new());
        cache.put("short", 1, Duration::from_millis(5));
        cache.put("long", 2, Duration::from_secs(60));

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = cache.spawn_sweeper(Duration::from_millis(20), stop_rx);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.len(), 1);

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
