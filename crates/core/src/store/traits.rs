//! Market data storage traits.
//!
//! This module defines the persistence interface the aggregation service
//! reads through and writes behind. Implementations handle the actual
//! storage; the core only ships an in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cryptofolio_market_data::{
    normalize_currency, AssetDetail, AssetId, Currency, GlobalSnapshot, HistoricalSeries,
    MarketItem,
};

use crate::errors::Result;

/// Page size used when a query asks for zero rows.
pub const DEFAULT_SNAPSHOT_LIMIT: u32 = 100;

/// Trim, sort and de-duplicate a list of asset ids. Blank ids are dropped.
pub fn normalize_ids(ids: &[String]) -> Vec<AssetId> {
    let mut ids: Vec<AssetId> = ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Parameters of a stored snapshot lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub currency: Currency,
    /// Page size; zero means [`DEFAULT_SNAPSHOT_LIMIT`].
    pub limit: u32,
    /// One-based page number; zero means the first page.
    pub page: u32,
    /// Restrict to these asset ids. Empty means all.
    pub ids: Vec<AssetId>,
}

impl SnapshotQuery {
    pub fn new(currency: &str, limit: u32, page: u32) -> Self {
        Self {
            currency: normalize_currency(currency),
            limit,
            page,
            ids: Vec::new(),
        }
    }

    /// Restrict to `ids`, trimmed, sorted and de-duplicated.
    pub fn with_ids(mut self, ids: &[String]) -> Self {
        self.ids = normalize_ids(ids);
        self
    }

    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_SNAPSHOT_LIMIT as usize
        } else {
            self.limit as usize
        }
    }

    pub fn effective_page(&self) -> usize {
        self.page.max(1) as usize
    }

    /// Number of rows skipped before the requested page.
    pub fn offset(&self) -> usize {
        (self.effective_page() - 1) * self.effective_limit()
    }
}

/// Storage interface for aggregated market data.
///
/// # Write semantics
///
/// Every `save_*` method merges with overwrite-if-newer: a record whose
/// timestamp is older than the stored one is ignored. Ties overwrite.
///
/// # Method Naming Convention
///
/// - `get_*` - Read; `None` (or an empty page) when nothing is stored
/// - `save_*` - Merge write; returns how much was actually written
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Stored snapshot rows for `query.currency`, ordered by ascending market
    /// cap rank with unranked rows last, then paged.
    async fn get_snapshot(&self, query: &SnapshotQuery) -> Result<Vec<MarketItem>>;

    async fn get_detail(&self, id: &str) -> Result<Option<AssetDetail>>;

    async fn get_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<Option<HistoricalSeries>>;

    async fn get_global(&self) -> Result<Option<GlobalSnapshot>>;

    /// Merge snapshot rows, keyed by (id, currency).
    ///
    /// # Returns
    ///
    /// The number of rows inserted or replaced
    async fn save_snapshot(&self, items: &[MarketItem]) -> Result<usize>;

    /// Returns `false` when an existing newer record was kept.
    async fn save_detail(&self, detail: &AssetDetail) -> Result<bool>;

    /// Merge a series, keyed by (id, currency, days).
    async fn save_history(&self, series: &HistoricalSeries) -> Result<bool>;

    async fn save_global(&self, global: &GlobalSnapshot) -> Result<bool>;

    /// Delete every record last updated before `cutoff`.
    ///
    /// # Returns
    ///
    /// The number of records deleted
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
