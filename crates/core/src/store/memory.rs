//! In-memory `MarketStore`.
//!
//! Backs the daemon and the tests when no SQL store is wired in. All four
//! record kinds live behind one lock, so a merge never interleaves with a
//! retention sweep.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

use cryptofolio_market_data::{
    normalize_currency, AssetDetail, AssetId, Currency, GlobalSnapshot, HistoricalSeries,
    MarketItem,
};

use super::traits::{MarketStore, SnapshotQuery};
use crate::errors::{Result, StoreError};

type HistoryKey = (AssetId, Currency, u32);

#[derive(Default)]
struct Tables {
    snapshot: HashMap<(AssetId, Currency), MarketItem>,
    details: HashMap<AssetId, AssetDetail>,
    histories: HashMap<HistoryKey, HistoricalSeries>,
    global: Option<GlobalSnapshot>,
}

/// Overwrite-if-newer: replace unless the incoming record is older.
fn is_not_older(incoming: DateTime<Utc>, stored: Option<DateTime<Utc>>) -> bool {
    stored.map_or(true, |stored| incoming >= stored)
}

#[derive(Default)]
pub struct InMemoryMarketStore {
    tables: RwLock<Tables>,
}

impl InMemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StoreError::QueryFailed(e.to_string()).into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StoreError::WriteFailed(e.to_string()).into())
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn get_snapshot(&self, query: &SnapshotQuery) -> Result<Vec<MarketItem>> {
        let tables = self.read()?;

        let mut rows: Vec<MarketItem> = if query.ids.is_empty() {
            tables
                .snapshot
                .values()
                .filter(|item| item.currency == query.currency)
                .cloned()
                .collect()
        } else {
            query
                .ids
                .iter()
                .filter_map(|id| tables.snapshot.get(&(id.clone(), query.currency.clone())))
                .cloned()
                .collect()
        };

        // Unranked rows sort after every ranked one.
        rows.sort_by_key(|item| (item.market_cap_rank.unwrap_or(u32::MAX), item.id.clone()));

        Ok(rows
            .into_iter()
            .skip(query.offset())
            .take(query.effective_limit())
            .collect())
    }

    async fn get_detail(&self, id: &str) -> Result<Option<AssetDetail>> {
        Ok(self.read()?.details.get(id).cloned())
    }

    async fn get_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<Option<HistoricalSeries>> {
        let key = (id.to_string(), normalize_currency(currency), days);
        Ok(self.read()?.histories.get(&key).cloned())
    }

    async fn get_global(&self) -> Result<Option<GlobalSnapshot>> {
        Ok(self.read()?.global.clone())
    }

    async fn save_snapshot(&self, items: &[MarketItem]) -> Result<usize> {
        let mut tables = self.write()?;
        let mut written = 0;
        for item in items {
            let key = (item.id.clone(), normalize_currency(&item.currency));
            let stored = tables.snapshot.get(&key).map(|s| s.last_updated);
            if is_not_older(item.last_updated, stored) {
                tables.snapshot.insert(key, item.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn save_detail(&self, detail: &AssetDetail) -> Result<bool> {
        let mut tables = self.write()?;
        let stored = tables.details.get(&detail.id).map(|d| d.last_updated);
        if !is_not_older(detail.last_updated, stored) {
            debug!("Kept newer stored detail for '{}'", detail.id);
            return Ok(false);
        }
        tables.details.insert(detail.id.clone(), detail.clone());
        Ok(true)
    }

    async fn save_history(&self, series: &HistoricalSeries) -> Result<bool> {
        let mut tables = self.write()?;
        let key = (
            series.id.clone(),
            normalize_currency(&series.currency),
            series.days,
        );
        let stored = tables.histories.get(&key).map(|s| s.last_updated);
        if !is_not_older(series.last_updated, stored) {
            debug!("Kept newer stored history for '{}'", series.id);
            return Ok(false);
        }
        tables.histories.insert(key, series.clone());
        Ok(true)
    }

    async fn save_global(&self, global: &GlobalSnapshot) -> Result<bool> {
        let mut tables = self.write()?;
        let stored = tables.global.as_ref().map(|g| g.updated_at);
        if !is_not_older(global.updated_at, stored) {
            return Ok(false);
        }
        tables.global = Some(global.clone());
        Ok(true)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.write()?;
        let before = tables.snapshot.len() + tables.details.len() + tables.histories.len();

        tables.snapshot.retain(|_, item| item.last_updated >= cutoff);
        tables.details.retain(|_, detail| detail.last_updated >= cutoff);
        tables.histories.retain(|_, series| series.last_updated >= cutoff);

        let mut removed =
            before - (tables.snapshot.len() + tables.details.len() + tables.histories.len());
        if tables.global.as_ref().is_some_and(|g| g.updated_at < cutoff) {
            tables.global = None;
            removed += 1;
        }
        Ok(removed)
    }
}
