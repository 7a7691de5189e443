//! CryptoCompare market data provider implementation.
//!
//! This module provides market data from the CryptoCompare min-API:
//! - Market snapshot via /data/top/mktcapfull
//! - Asset detail via /data/pricemultifull (prices only, no profile text)
//! - Daily price history via /data/v2/histoday
//!
//! CryptoCompare keys everything by ticker symbol, so asset ids are mapped
//! to symbols through a small table of well-known assets, falling back to
//! the upper-cased id. It has no global-totals endpoint.
//! API documentation: https://min-api.cryptocompare.com/documentation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use reqwest::Client;
use serde::Deserialize;

use super::http::{build_client, get_text, opt_decimal, to_decimal};
use crate::errors::MarketDataError;
use crate::models::{AssetDetail, CurrencyMap, HistoricalSeries, MarketItem, PricePoint};
use crate::provider::MarketDataProvider;

const BASE_URL: &str = "https://min-api.cryptocompare.com";
const PROVIDER_ID: &str = "CRYPTOCOMPARE";

/// Currencies requested alongside the primary one for asset detail maps.
const DETAIL_CURRENCIES: &[&str] = &["USD", "EUR", "BTC"];

/// Largest page /data/top/mktcapfull accepts.
const MAX_TOP_LIMIT: u32 = 100;

lazy_static! {
    /// (asset id, symbol, name) for assets whose id is not just the symbol.
    static ref KNOWN_ASSETS: Vec<(&'static str, &'static str, &'static str)> = vec![
        ("bitcoin", "BTC", "Bitcoin"),
        ("ethereum", "ETH", "Ethereum"),
        ("binancecoin", "BNB", "BNB"),
        ("ripple", "XRP", "XRP"),
        ("cardano", "ADA", "Cardano"),
        ("solana", "SOL", "Solana"),
        ("dogecoin", "DOGE", "Dogecoin"),
        ("polkadot", "DOT", "Polkadot"),
        ("tether", "USDT", "Tether"),
        ("usd-coin", "USDC", "USDC"),
        ("tron", "TRX", "TRON"),
        ("litecoin", "LTC", "Litecoin"),
        ("chainlink", "LINK", "Chainlink"),
        ("avalanche-2", "AVAX", "Avalanche"),
    ];
    static ref SYMBOL_BY_ID: HashMap<&'static str, (&'static str, &'static str)> = KNOWN_ASSETS
        .iter()
        .map(|(id, symbol, name)| (*id, (*symbol, *name)))
        .collect();
    static ref ID_BY_SYMBOL: HashMap<&'static str, &'static str> = KNOWN_ASSETS
        .iter()
        .map(|(id, symbol, _)| (*symbol, *id))
        .collect();
}

fn symbol_for(id: &str) -> String {
    SYMBOL_BY_ID
        .get(id)
        .map(|(symbol, _)| symbol.to_string())
        .unwrap_or_else(|| id.to_uppercase())
}

fn id_for(symbol: &str, full_name: &str) -> String {
    match ID_BY_SYMBOL.get(symbol) {
        Some(id) => id.to_string(),
        None => full_name.trim().to_lowercase().replace(' ', "-"),
    }
}

// ============================================================================
// API Response Structures
// ============================================================================

/// Raw per-currency figures shared by mktcapfull and pricemultifull
#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RawQuote {
    price: Option<f64>,
    mktcap: Option<f64>,
    #[serde(rename = "TOTALVOLUME24HTO")]
    total_volume_24h: Option<f64>,
    #[serde(rename = "HIGH24HOUR")]
    high_24h: Option<f64>,
    #[serde(rename = "LOW24HOUR")]
    low_24h: Option<f64>,
    #[serde(rename = "CHANGE24HOUR")]
    change_24h: Option<f64>,
    #[serde(rename = "CHANGEPCT24HOUR")]
    change_pct_24h: Option<f64>,
    supply: Option<f64>,
    circulatingsupply: Option<f64>,
    /// Unix seconds
    lastupdate: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TopResponse {
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "Data", default)]
    data: Vec<TopEntry>,
}

#[derive(Debug, Deserialize)]
struct TopEntry {
    #[serde(rename = "CoinInfo")]
    coin_info: CoinInfo,
    #[serde(rename = "RAW", default)]
    raw: HashMap<String, RawQuote>,
}

#[derive(Debug, Deserialize)]
struct CoinInfo {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "FullName")]
    full_name: String,
    #[serde(rename = "ImageUrl")]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceMultiResponse {
    #[serde(rename = "RAW", default)]
    raw: HashMap<String, HashMap<String, RawQuote>>,
}

#[derive(Debug, Deserialize)]
struct HistoDayResponse {
    #[serde(rename = "Response")]
    response: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "Data")]
    data: Option<HistoDayData>,
}

#[derive(Debug, Deserialize)]
struct HistoDayData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoDayBar>,
}

#[derive(Debug, Deserialize)]
struct HistoDayBar {
    time: i64,
    close: Option<f64>,
    volumeto: Option<f64>,
}

// ============================================================================
// Provider
// ============================================================================

/// CryptoCompare JSON API client.
pub struct CryptoCompareProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CryptoCompareProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: build_client(),
            base_url: BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, MarketDataError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut params = params.to_vec();
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        get_text(&self.client, PROVIDER_ID, &url, &params).await
    }
}

#[async_trait]
impl MarketDataProvider for CryptoCompareProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    async fn fetch_snapshot(
        &self,
        currency: &str,
        limit: u32,
    ) -> Result<Vec<MarketItem>, MarketDataError> {
        let params = [
            ("limit", limit.clamp(10, MAX_TOP_LIMIT).to_string()),
            ("tsym", currency.to_uppercase()),
        ];
        let body = self.fetch("/data/top/mktcapfull", &params).await?;
        let mut items = parse_top(&body, currency, Utc::now())?;
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn fetch_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        let symbol = symbol_for(id);
        let params = [
            ("fsyms", symbol.clone()),
            ("tsyms", DETAIL_CURRENCIES.join(",")),
        ];
        let body = self.fetch("/data/pricemultifull", &params).await?;
        parse_price_multi(&body, id, &symbol, Utc::now())
    }

    async fn fetch_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let symbol = symbol_for(id);
        let params = [
            ("fsym", symbol.clone()),
            ("tsym", currency.to_uppercase()),
            ("limit", days.max(1).to_string()),
        ];
        let body = self.fetch("/data/v2/histoday", &params).await?;
        Ok(parse_histoday(&body, id, currency, days, Utc::now())?.with_symbol(symbol))
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn timestamp(secs: Option<i64>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
        .unwrap_or(fallback)
}

fn parse_top(
    body: &str,
    currency: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<MarketItem>, MarketDataError> {
    let response: TopResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::parse(PROVIDER_ID, e))?;

    let tsym = currency.to_uppercase();
    let items: Vec<MarketItem> = response
        .data
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let raw = entry.raw.get(&tsym)?;
            let price = opt_decimal(raw.price)?;
            let symbol = entry.coin_info.name;
            let mut item = MarketItem::new(
                id_for(&symbol, &entry.coin_info.full_name),
                symbol,
                entry.coin_info.full_name,
                currency,
                price,
                timestamp(raw.lastupdate, fetched_at),
                PROVIDER_ID,
            )
            // The endpoint is sorted by market cap
            .with_rank(index as u32 + 1);
            item.image = entry
                .coin_info
                .image_url
                .map(|path| format!("https://www.cryptocompare.com{}", path));
            item.market_cap = opt_decimal(raw.mktcap);
            item.total_volume = opt_decimal(raw.total_volume_24h);
            item.high_24h = opt_decimal(raw.high_24h);
            item.low_24h = opt_decimal(raw.low_24h);
            item.price_change_24h = opt_decimal(raw.change_24h);
            item.price_change_percentage_24h = opt_decimal(raw.change_pct_24h);
            item.circulating_supply = opt_decimal(raw.circulatingsupply);
            item.total_supply = opt_decimal(raw.supply);
            Some(item)
        })
        .collect();

    if items.is_empty() {
        if let Some(message) = response.message.filter(|m| !m.is_empty() && m != "Success") {
            return Err(MarketDataError::parse(PROVIDER_ID, message));
        }
        return Err(MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        });
    }
    Ok(items)
}

fn parse_price_multi(
    body: &str,
    id: &str,
    symbol: &str,
    fetched_at: DateTime<Utc>,
) -> Result<AssetDetail, MarketDataError> {
    let response: PriceMultiResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::parse(PROVIDER_ID, e))?;

    let quotes = response
        .raw
        .get(symbol)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        })?;

    let name = SYMBOL_BY_ID
        .get(id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| symbol.to_string());

    let last_updated = quotes
        .values()
        .filter_map(|q| q.lastupdate)
        .max()
        .map(|secs| timestamp(Some(secs), fetched_at))
        .unwrap_or(fetched_at);

    let mut detail = AssetDetail::new(id, symbol, name, last_updated, PROVIDER_ID);
    let md = &mut detail.market_data;
    for (tsym, quote) in quotes {
        let key = tsym.to_ascii_lowercase();
        insert(&mut md.current_price, &key, quote.price);
        insert(&mut md.market_cap, &key, quote.mktcap);
        insert(&mut md.total_volume, &key, quote.total_volume_24h);
        insert(&mut md.high_24h, &key, quote.high_24h);
        insert(&mut md.low_24h, &key, quote.low_24h);
    }
    if let Some(usd) = quotes.get("USD") {
        md.price_change_24h = opt_decimal(usd.change_24h);
        md.price_change_percentage_24h = opt_decimal(usd.change_pct_24h);
        md.circulating_supply = opt_decimal(usd.circulatingsupply);
        md.total_supply = opt_decimal(usd.supply);
    }

    if md.current_price.is_empty() {
        return Err(MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        });
    }
    Ok(detail)
}

fn insert(map: &mut CurrencyMap, key: &str, value: Option<f64>) {
    if let Some(v) = opt_decimal(value) {
        map.insert(key.to_string(), v);
    }
}

fn parse_histoday(
    body: &str,
    id: &str,
    currency: &str,
    days: u32,
    fetched_at: DateTime<Utc>,
) -> Result<HistoricalSeries, MarketDataError> {
    let response: HistoDayResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::parse(PROVIDER_ID, e))?;

    if response.response.as_deref() == Some("Error") {
        return Err(MarketDataError::parse(
            PROVIDER_ID,
            response.message.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    let bars = response.data.map(|d| d.data).unwrap_or_default();
    let mut prices = Vec::with_capacity(bars.len());
    let mut volumes = Vec::with_capacity(bars.len());
    for bar in bars {
        let Some(ts) = Utc.timestamp_opt(bar.time, 0).single() else {
            continue;
        };
        // Bars before the asset existed are reported with a zero close
        if let Some(close) = bar.close.and_then(to_decimal).filter(|c| !c.is_zero()) {
            prices.push(PricePoint::new(ts, close));
            if let Some(volume) = bar.volumeto.and_then(to_decimal) {
                volumes.push(PricePoint::new(ts, volume));
            }
        }
    }

    if prices.is_empty() {
        return Err(MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        });
    }

    let mut series = HistoricalSeries::new(id, currency, days, prices, fetched_at, PROVIDER_ID);
    series.total_volumes = volumes;
    Ok(series.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_provider_id() {
        let provider = CryptoCompareProvider::new(None);
        assert_eq!(provider.id(), "CRYPTOCOMPARE");
        assert_eq!(provider.priority(), 2);
    }

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(symbol_for("ripple"), "XRP");
        assert_eq!(symbol_for("pepe"), "PEPE");
        assert_eq!(id_for("XRP", "XRP"), "ripple");
        assert_eq!(id_for("SHIB", "Shiba Inu"), "shiba-inu");
    }

    #[test]
    fn test_parse_top() {
        let body = r#"{"Message":"Success","Data":[
            {"CoinInfo":{"Name":"BTC","FullName":"Bitcoin","ImageUrl":"/media/btc.png"},
             "RAW":{"USD":{"PRICE":64000.5,"MKTCAP":1.26e12,"TOTALVOLUME24HTO":3.1e10,
                           "CHANGEPCT24HOUR":-0.2,"SUPPLY":19700000,"LASTUPDATE":1714564800}}},
            {"CoinInfo":{"Name":"NEW","FullName":"New Coin"},"RAW":{}}
        ]}"#;

        let items = parse_top(body, "usd", Utc::now()).unwrap();
        assert_eq!(items.len(), 1);
        let btc = &items[0];
        assert_eq!(btc.id, "bitcoin");
        assert_eq!(btc.symbol, "BTC");
        assert_eq!(btc.current_price, dec!(64000.5));
        assert_eq!(btc.market_cap_rank, Some(1));
        assert_eq!(btc.image.as_deref(), Some("https://www.cryptocompare.com/media/btc.png"));
        assert_eq!(btc.last_updated.timestamp(), 1714564800);
        assert_eq!(btc.source, "CRYPTOCOMPARE");
    }

    #[test]
    fn test_parse_top_error_message() {
        let body = r#"{"Response":"Error","Message":"tsym param is invalid","Data":[]}"#;
        let result = parse_top(body, "zzz", Utc::now());
        assert!(matches!(result, Err(MarketDataError::ParseFailure { .. })));
    }

    #[test]
    fn test_parse_price_multi() {
        let body = r#"{"RAW":{"ETH":{
            "USD":{"PRICE":3000,"MKTCAP":3.6e11,"CHANGEPCT24HOUR":1.5,"LASTUPDATE":1714564800},
            "EUR":{"PRICE":2800,"LASTUPDATE":1714564700}
        }}}"#;

        let detail = parse_price_multi(body, "ethereum", "ETH", Utc::now()).unwrap();
        assert_eq!(detail.name, "Ethereum");
        assert_eq!(detail.market_data.current_price.get("usd"), Some(&dec!(3000)));
        assert_eq!(detail.market_data.current_price.get("eur"), Some(&dec!(2800)));
        assert_eq!(detail.market_data.price_change_percentage_24h, Some(dec!(1.5)));
        assert_eq!(detail.last_updated.timestamp(), 1714564800);
    }

    #[test]
    fn test_parse_price_multi_missing_symbol() {
        let result = parse_price_multi(r#"{"RAW":{}}"#, "ethereum", "ETH", Utc::now());
        assert!(matches!(result, Err(MarketDataError::NoData { .. })));
    }

    #[test]
    fn test_parse_histoday_skips_zero_bars() {
        let body = r#"{"Response":"Success","Data":{"Data":[
            {"time":1714348800,"close":0,"volumeto":0},
            {"time":1714435200,"close":63000,"volumeto":1000},
            {"time":1714521600,"close":64000,"volumeto":2000}
        ]}}"#;

        let series = parse_histoday(body, "bitcoin", "usd", 2, Utc::now()).unwrap();
        assert_eq!(series.prices.len(), 2);
        assert_eq!(series.total_volumes.len(), 2);
        assert_eq!(series.prices[1].value, dec!(64000));
        assert!(series.is_strictly_ascending());
    }

    #[test]
    fn test_parse_histoday_error_response() {
        let body = r#"{"Response":"Error","Message":"There is no data for the symbol XYZ ."}"#;
        let result = parse_histoday(body, "xyz", "usd", 7, Utc::now());
        assert!(matches!(result, Err(MarketDataError::ParseFailure { .. })));
    }
}
