use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::AssetId;

/// Currency code to value, e.g. `{"usd": 64000, "eur": 59000}`.
pub type CurrencyMap = BTreeMap<String, Decimal>;

/// Full profile of a single asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetDetail {
    pub id: AssetId,
    pub symbol: String,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    pub market_data: AssetMarketData,

    pub links: AssetLinks,

    #[serde(default)]
    pub categories: Vec<String>,

    pub last_updated: DateTime<Utc>,

    pub source: String,
}

impl AssetDetail {
    pub fn new(
        id: impl Into<AssetId>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        last_updated: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            description: None,
            image: None,
            market_data: AssetMarketData::default(),
            links: AssetLinks::default(),
            categories: Vec::new(),
            last_updated,
            source: source.into(),
        }
    }
}

/// Multi-currency market figures attached to an [`AssetDetail`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMarketData {
    #[serde(default)]
    pub current_price: CurrencyMap,
    #[serde(default)]
    pub market_cap: CurrencyMap,
    #[serde(default)]
    pub total_volume: CurrencyMap,
    #[serde(default)]
    pub high_24h: CurrencyMap,
    #[serde(default)]
    pub low_24h: CurrencyMap,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_percentage_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_percentage_7d: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_percentage_30d: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_change_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_change_percentage_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulating_supply: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_supply: Option<Decimal>,
}

/// External links published for an asset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetLinks {
    #[serde(default)]
    pub homepage: Vec<String>,
    #[serde(default)]
    pub blockchain_site: Vec<String>,
    #[serde(default)]
    pub official_forum_url: Vec<String>,
    #[serde(default)]
    pub chat_url: Vec<String>,
    #[serde(default)]
    pub announcement_url: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_screen_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_channel_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subreddit_url: Option<String>,
    /// Source repositories (GitHub and similar)
    #[serde(default)]
    pub repos_url: Vec<String>,
}
