use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use cryptofolio_market_data::{
    normalize_currency, AssetDetail, GlobalSnapshot, HistoricalSeries, MarketDataError,
    MarketItem, ProviderRegistry,
};

use super::market_data_model::{AggregatorConfig, StoreLookup};
use super::market_data_traits::MarketDataServiceTrait;
use crate::cache::{CacheKey, CachedPayload, TtlCache};
use crate::errors::Result;
use crate::store::{MarketStore, PersistJob, PersistQueue, SnapshotQuery};

/// Aggregates provider data behind a cache and a persistent store.
///
/// Lookup order for every `get_*` call:
///
/// 1. Cache, keyed by the operation and its normalized parameters
/// 2. Store, if the record is younger than the kind's staleness threshold
/// 3. Providers, through the registry's fan-out or fallback policy
///
/// Live results are queued for persistence and cached. Failures are never
/// cached.
pub struct MarketDataService {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn MarketStore>,
    cache: Arc<TtlCache<CacheKey, CachedPayload>>,
    persist: PersistQueue,
    persist_worker: Mutex<Option<JoinHandle<()>>>,
    config: AggregatorConfig,
}

impl MarketDataService {
    /// Must be called inside a tokio runtime; spawns the persistence worker.
    pub fn new(registry: Arc<ProviderRegistry>, store: Arc<dyn MarketStore>) -> Self {
        Self::with_config(registry, store, AggregatorConfig::default())
    }

    pub fn with_config(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn MarketStore>,
        config: AggregatorConfig,
    ) -> Self {
        let (persist, worker) = PersistQueue::spawn(store.clone(), config.persist_capacity);
        Self {
            registry,
            store,
            cache: Arc::new(TtlCache::new()),
            persist,
            persist_worker: Mutex::new(Some(worker)),
            config,
        }
    }

    /// The response cache, for wiring up the background sweep.
    pub fn cache(&self) -> &Arc<TtlCache<CacheKey, CachedPayload>> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Wait until every queued store write has been applied.
    pub async fn flush(&self) {
        self.persist.flush().await;
    }

    /// Apply queued store writes and stop the persistence worker.
    ///
    /// Reads keep working afterwards, but live results are no longer stored.
    pub async fn shutdown(&self) {
        self.persist.shutdown().await;
        let worker = self
            .persist_worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Persistence worker ended abnormally: {}", e);
            }
        }
        info!("Market data service shut down");
    }

    fn cached(&self, key: &CacheKey) -> Option<CachedPayload> {
        let hit = self.cache.get(key);
        if hit.is_some() {
            debug!("Cache hit for {:?}", key);
        }
        hit
    }

    fn fill(&self, key: CacheKey, payload: CachedPayload, ttl: Duration) {
        self.cache.put(key, payload, ttl);
    }

    /// Turn a store read into a lookup outcome. Store errors count as a miss.
    fn judge<T>(
        &self,
        key: &CacheKey,
        stored: Result<Option<T>>,
        updated_at: impl Fn(&T) -> DateTime<Utc>,
        max_age: Duration,
    ) -> StoreLookup<T> {
        let stored = match stored {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Store lookup for {} failed: {}", key.operation(), e);
                None
            }
        };
        let lookup = StoreLookup::classify(stored, updated_at, max_age);
        match &lookup {
            StoreLookup::Fresh(_) => debug!("Store hit for {:?}", key),
            StoreLookup::Stale { age } => {
                debug!("Stored {} is stale ({:?} old), going live", key.operation(), age)
            }
            StoreLookup::Missing => debug!("Store miss for {:?}", key),
        }
        lookup
    }
}

fn has_all_ids(ids: &[String], rows: &[MarketItem]) -> bool {
    ids.iter().all(|id| rows.iter().any(|row| &row.id == id))
}

/// Whether a stored page holds every requested id. Only the first page is
/// checked, and only when all requested ids fit on it.
fn is_complete_page(query: &SnapshotQuery, rows: &[MarketItem]) -> bool {
    query.offset() > 0
        || query.ids.len() > query.effective_limit()
        || has_all_ids(&query.ids, rows)
}

/// Distinct `source` tags of a merged snapshot, in first-seen order.
fn source_list(items: &[MarketItem]) -> String {
    let mut sources: Vec<&str> = Vec::new();
    for item in items {
        if !sources.contains(&item.source.as_str()) {
            sources.push(&item.source);
        }
    }
    sources.join(", ")
}

#[async_trait]
impl MarketDataServiceTrait for MarketDataService {
    async fn get_market_snapshot(
        &self,
        currency: &str,
        limit: u32,
        page: u32,
        ids: Option<&[String]>,
    ) -> Result<Vec<MarketItem>> {
        let ids = ids.unwrap_or_default();
        let key = CacheKey::snapshot(currency, limit, page, ids);
        if let Some(CachedPayload::Snapshot(items)) = self.cached(&key) {
            return Ok(items);
        }

        let query = SnapshotQuery::new(currency, limit, page).with_ids(ids);
        let stored = self
            .store
            .get_snapshot(&query)
            .await
            .map(|rows| (!rows.is_empty() && is_complete_page(&query, &rows)).then_some(rows));
        let oldest = |rows: &Vec<MarketItem>| {
            rows.iter()
                .map(|r| r.last_updated)
                .min()
                .unwrap_or_else(Utc::now)
        };
        if let StoreLookup::Fresh(rows) =
            self.judge(&key, stored, oldest, self.config.staleness.snapshot)
        {
            self.fill(
                key,
                CachedPayload::Snapshot(rows.clone()),
                self.config.cache_ttls.snapshot,
            );
            return Ok(rows);
        }

        let mut items = self
            .registry
            .fetch_snapshot(&query.currency, query.effective_limit() as u32)
            .await?;
        self.persist.enqueue(PersistJob::Snapshot(items.clone()));

        if query.ids.is_empty() {
            self.fill(
                key,
                CachedPayload::Snapshot(items.clone()),
                self.config.cache_ttls.snapshot,
            );
            return Ok(items);
        }

        let sources = source_list(&items);
        items.retain(|item| query.ids.contains(&item.id));
        if items.is_empty() {
            debug!("None of {:?} in the live snapshot", query.ids);
            return Err(MarketDataError::NoData { provider: sources }.into());
        }
        // Only a complete answer is cached.
        if has_all_ids(&query.ids, &items) {
            self.fill(
                key,
                CachedPayload::Snapshot(items.clone()),
                self.config.cache_ttls.snapshot,
            );
        }
        Ok(items)
    }

    async fn get_asset_detail(&self, id: &str) -> Result<AssetDetail> {
        let key = CacheKey::detail(id);
        if let Some(CachedPayload::Detail(detail)) = self.cached(&key) {
            return Ok(detail);
        }

        let stored = self.store.get_detail(id).await;
        if let StoreLookup::Fresh(detail) = self.judge(
            &key,
            stored,
            |d: &AssetDetail| d.last_updated,
            self.config.staleness.detail,
        ) {
            self.fill(
                key,
                CachedPayload::Detail(detail.clone()),
                self.config.cache_ttls.detail,
            );
            return Ok(detail);
        }

        self.refresh_asset_detail(id).await
    }

    async fn get_historical_series(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries> {
        let key = CacheKey::history(id, currency, days);
        if let Some(CachedPayload::History(series)) = self.cached(&key) {
            return Ok(series);
        }

        let stored = self
            .store
            .get_history(id, currency, days)
            .await
            .map(|series| series.filter(|s| !s.prices.is_empty()));
        if let StoreLookup::Fresh(series) = self.judge(
            &key,
            stored,
            |s: &HistoricalSeries| s.last_updated,
            self.config.staleness.history,
        ) {
            self.fill(
                key,
                CachedPayload::History(series.clone()),
                self.config.cache_ttls.history,
            );
            return Ok(series);
        }

        self.refresh_historical_series(id, currency, days).await
    }

    async fn get_global_snapshot(&self) -> Result<GlobalSnapshot> {
        let key = CacheKey::Global;
        if let Some(CachedPayload::Global(global)) = self.cached(&key) {
            return Ok(global);
        }

        let stored = self.store.get_global().await;
        if let StoreLookup::Fresh(global) = self.judge(
            &key,
            stored,
            |g: &GlobalSnapshot| g.updated_at,
            self.config.staleness.global,
        ) {
            self.fill(
                key,
                CachedPayload::Global(global.clone()),
                self.config.cache_ttls.global,
            );
            return Ok(global);
        }

        self.refresh_global_snapshot().await
    }

    async fn refresh_market_snapshot(&self, currency: &str, limit: u32) -> Result<Vec<MarketItem>> {
        let query = SnapshotQuery::new(currency, limit, 1);
        let items = self
            .registry
            .fetch_snapshot(&query.currency, query.effective_limit() as u32)
            .await?;
        info!("Refreshed {} snapshot rows ({})", items.len(), query.currency);

        self.persist.enqueue(PersistJob::Snapshot(items.clone()));
        self.fill(
            CacheKey::snapshot(currency, limit, 1, &[]),
            CachedPayload::Snapshot(items.clone()),
            self.config.cache_ttls.snapshot,
        );
        Ok(items)
    }

    async fn refresh_asset_detail(&self, id: &str) -> Result<AssetDetail> {
        let detail = self.registry.fetch_detail(id).await?;

        self.persist.enqueue(PersistJob::Detail(detail.clone()));
        self.fill(
            CacheKey::detail(id),
            CachedPayload::Detail(detail.clone()),
            self.config.cache_ttls.detail,
        );
        Ok(detail)
    }

    async fn refresh_historical_series(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries> {
        let currency = normalize_currency(currency);
        let series = self.registry.fetch_history(id, &currency, days).await?;

        self.persist.enqueue(PersistJob::History(series.clone()));
        self.fill(
            CacheKey::history(id, &currency, days),
            CachedPayload::History(series.clone()),
            self.config.cache_ttls.history,
        );
        Ok(series)
    }

    async fn refresh_global_snapshot(&self) -> Result<GlobalSnapshot> {
        let global = self.registry.fetch_global().await?;

        self.persist.enqueue(PersistJob::Global(global.clone()));
        self.fill(
            CacheKey::Global,
            CachedPayload::Global(global.clone()),
            self.config.cache_ttls.global,
        );
        Ok(global)
    }
}
