use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::detail::CurrencyMap;

/// Market-wide totals across all tracked assets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    pub active_cryptocurrencies: u32,

    pub markets: u32,

    /// Total market capitalisation per currency
    #[serde(default)]
    pub total_market_cap: CurrencyMap,

    /// Total 24h volume per currency
    #[serde(default)]
    pub total_volume: CurrencyMap,

    /// Dominance by lower-cased symbol, in percent (e.g. `{"btc": 52.1}`)
    #[serde(default)]
    pub market_cap_percentage: CurrencyMap,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_change_percentage_24h_usd: Option<Decimal>,

    pub updated_at: DateTime<Utc>,

    pub source: String,
}

impl GlobalSnapshot {
    pub fn new(updated_at: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self {
            active_cryptocurrencies: 0,
            markets: 0,
            total_market_cap: CurrencyMap::new(),
            total_volume: CurrencyMap::new(),
            market_cap_percentage: CurrencyMap::new(),
            market_cap_change_percentage_24h_usd: None,
            updated_at,
            source: source.into(),
        }
    }
}
