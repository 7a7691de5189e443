use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{AssetId, Currency};

/// One row of a market snapshot: an asset priced in a single currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketItem {
    /// Asset identifier (e.g. "bitcoin")
    pub id: AssetId,

    /// Ticker symbol, upper-cased (e.g. "BTC")
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Currency the price fields are quoted in
    pub currency: Currency,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Current price (required)
    pub current_price: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    /// Rank by market cap, 1 is the largest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_24h: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_24h: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_24h: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_percentage_24h: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulating_supply: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_supply: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ath: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ath_change_percentage: Option<Decimal>,

    /// When the provider last updated this row
    pub last_updated: DateTime<Utc>,

    /// Provider that produced the row (COINGECKO, COINMARKETCAP, ...)
    pub source: String,
}

impl MarketItem {
    /// Create an item with the required fields only.
    pub fn new(
        id: impl Into<AssetId>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        currency: impl Into<Currency>,
        current_price: Decimal,
        last_updated: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            currency: currency.into(),
            image: None,
            current_price,
            market_cap: None,
            market_cap_rank: None,
            total_volume: None,
            high_24h: None,
            low_24h: None,
            price_change_24h: None,
            price_change_percentage_24h: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            ath: None,
            ath_change_percentage: None,
            last_updated,
            source: source.into(),
        }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.market_cap_rank = Some(rank);
        self
    }

    pub fn with_market_cap(mut self, market_cap: Decimal) -> Self {
        self.market_cap = Some(market_cap);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_item_new() {
        let item = MarketItem::new(
            "bitcoin",
            "BTC",
            "Bitcoin",
            "usd",
            dec!(64000.5),
            Utc::now(),
            "COINGECKO",
        )
        .with_rank(1);

        assert_eq!(item.current_price, dec!(64000.5));
        assert_eq!(item.market_cap_rank, Some(1));
        assert!(item.market_cap.is_none());
    }

    #[test]
    fn test_market_item_skips_empty_fields() {
        let item = MarketItem::new("eth", "ETH", "Ethereum", "usd", dec!(3000), Utc::now(), "X");
        let json = serde_json::to_value(&item).unwrap();

        assert!(json.get("market_cap").is_none());
        assert_eq!(json["source"], "X");
    }
}
