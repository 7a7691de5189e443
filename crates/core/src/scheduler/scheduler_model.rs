//! Scheduler configuration and lifecycle state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use cryptofolio_market_data::AssetId;

/// Collection interval: 15 minutes
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_secs(15 * 60);
/// Indicator interval: 1 hour
pub const DEFAULT_INDICATOR_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Sentiment interval: 30 minutes
pub const DEFAULT_SENTIMENT_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Retention interval: 24 hours
pub const DEFAULT_RETENTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_INDICATOR_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_SENTIMENT_DELAY: Duration = Duration::from_secs(3);

/// Records older than this are deleted by the retention job.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Scheduler lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// An asset the batch jobs cover, by ticker and provider id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedAsset {
    pub symbol: String,
    pub id: AssetId,
}

impl WatchedAsset {
    pub fn new(symbol: impl Into<String>, id: impl Into<AssetId>) -> Self {
        Self {
            symbol: symbol.into(),
            id: id.into(),
        }
    }
}

pub fn default_watched_assets() -> Vec<WatchedAsset> {
    [
        ("BTC", "bitcoin"),
        ("ETH", "ethereum"),
        ("BNB", "binancecoin"),
        ("XRP", "ripple"),
        ("ADA", "cardano"),
        ("SOL", "solana"),
        ("DOGE", "dogecoin"),
        ("DOT", "polkadot"),
    ]
    .into_iter()
    .map(|(symbol, id)| WatchedAsset::new(symbol, id))
    .collect()
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub collection_interval: Duration,
    pub indicator_interval: Duration,
    pub sentiment_interval: Duration,
    pub retention_interval: Duration,
    /// Pause between symbols in the indicator job.
    pub indicator_delay: Duration,
    /// Pause between symbols in the sentiment job.
    pub sentiment_delay: Duration,
    pub retention_days: u32,
    /// Assets scored by the indicator and sentiment jobs.
    pub watched_assets: Vec<WatchedAsset>,
    /// Assets whose detail and history the collection job refreshes.
    pub tracked_assets: Vec<AssetId>,
    pub snapshot_currency: String,
    pub snapshot_limit: u32,
    /// History window refreshed by the collection job.
    pub collection_history_days: u32,
    /// History window the indicator job scores.
    pub indicator_history_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let watched_assets = default_watched_assets();
        let tracked_assets = watched_assets.iter().map(|a| a.id.clone()).collect();
        Self {
            collection_interval: DEFAULT_COLLECTION_INTERVAL,
            indicator_interval: DEFAULT_INDICATOR_INTERVAL,
            sentiment_interval: DEFAULT_SENTIMENT_INTERVAL,
            retention_interval: DEFAULT_RETENTION_INTERVAL,
            indicator_delay: DEFAULT_INDICATOR_DELAY,
            sentiment_delay: DEFAULT_SENTIMENT_DELAY,
            retention_days: DEFAULT_RETENTION_DAYS,
            watched_assets,
            tracked_assets,
            snapshot_currency: "usd".to_string(),
            snapshot_limit: 100,
            collection_history_days: 7,
            indicator_history_days: 30,
        }
    }
}
