//! CoinGecko market data provider implementation.
//!
//! This module provides market data from the public CoinGecko API:
//! - Market snapshot via /coins/markets
//! - Asset detail via /coins/{id}
//! - Price history via /coins/{id}/market_chart
//! - Global totals via /global
//!
//! The free tier needs no API key but is rate limited per IP; 429s are
//! surfaced as `RateLimited` so the circuit breaker can back off.
//! API documentation: https://docs.coingecko.com/reference/introduction

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::http::{build_client, get_text, opt_decimal, to_decimal};
use crate::errors::MarketDataError;
use crate::models::{
    AssetDetail, AssetLinks, AssetMarketData, CurrencyMap, GlobalSnapshot, HistoricalSeries,
    MarketItem, PricePoint,
};
use crate::provider::MarketDataProvider;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PROVIDER_ID: &str = "COINGECKO";

// ============================================================================
// API Response Structures
// ============================================================================

/// Row of /coins/markets
#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    symbol: String,
    name: String,
    image: Option<String>,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    market_cap_rank: Option<u32>,
    total_volume: Option<f64>,
    high_24h: Option<f64>,
    low_24h: Option<f64>,
    price_change_24h: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    circulating_supply: Option<f64>,
    total_supply: Option<f64>,
    max_supply: Option<f64>,
    ath: Option<f64>,
    ath_change_percentage: Option<f64>,
    last_updated: Option<DateTime<Utc>>,
}

/// Response from /coins/{id}
#[derive(Debug, Deserialize)]
struct CoinResponse {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    description: HashMap<String, Option<String>>,
    image: Option<CoinImage>,
    #[serde(default)]
    categories: Vec<Option<String>>,
    #[serde(default)]
    links: Option<CoinLinks>,
    market_data: Option<CoinMarketData>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CoinImage {
    large: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CoinLinks {
    #[serde(default)]
    homepage: Vec<Option<String>>,
    #[serde(default)]
    blockchain_site: Vec<Option<String>>,
    #[serde(default)]
    official_forum_url: Vec<Option<String>>,
    #[serde(default)]
    chat_url: Vec<Option<String>>,
    #[serde(default)]
    announcement_url: Vec<Option<String>>,
    twitter_screen_name: Option<String>,
    facebook_username: Option<String>,
    telegram_channel_identifier: Option<String>,
    subreddit_url: Option<String>,
    repos_url: Option<ReposUrl>,
}

#[derive(Debug, Default, Deserialize)]
struct ReposUrl {
    #[serde(default)]
    github: Vec<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct CoinMarketData {
    #[serde(default)]
    current_price: HashMap<String, Option<f64>>,
    #[serde(default)]
    market_cap: HashMap<String, Option<f64>>,
    #[serde(default)]
    total_volume: HashMap<String, Option<f64>>,
    #[serde(default)]
    high_24h: HashMap<String, Option<f64>>,
    #[serde(default)]
    low_24h: HashMap<String, Option<f64>>,
    price_change_24h: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    price_change_percentage_7d: Option<f64>,
    price_change_percentage_30d: Option<f64>,
    market_cap_change_24h: Option<f64>,
    market_cap_change_percentage_24h: Option<f64>,
    circulating_supply: Option<f64>,
    total_supply: Option<f64>,
    max_supply: Option<f64>,
}

/// Response from /coins/{id}/market_chart. Each sample is `[unix_ms, value]`.
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    market_caps: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    total_volumes: Vec<(f64, Option<f64>)>,
}

/// Response from /global
#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    #[serde(default)]
    active_cryptocurrencies: u32,
    #[serde(default)]
    markets: u32,
    #[serde(default)]
    total_market_cap: HashMap<String, Option<f64>>,
    #[serde(default)]
    total_volume: HashMap<String, Option<f64>>,
    #[serde(default)]
    market_cap_percentage: HashMap<String, Option<f64>>,
    market_cap_change_percentage_24h_usd: Option<f64>,
    /// Unix seconds
    updated_at: Option<i64>,
}

// ============================================================================
// Provider
// ============================================================================

/// CoinGecko JSON API client.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the client at a different deployment (pro API, local mock).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, MarketDataError> {
        let url = format!("{}{}", self.base_url, endpoint);
        get_text(&self.client, PROVIDER_ID, &url, params).await
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    async fn fetch_snapshot(
        &self,
        currency: &str,
        limit: u32,
    ) -> Result<Vec<MarketItem>, MarketDataError> {
        let params = [
            ("vs_currency", currency.to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", limit.to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
        ];
        let body = self.fetch("/coins/markets", &params).await?;
        parse_markets(&body, currency, Utc::now())
    }

    async fn fetch_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        let params = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("community_data", "false".to_string()),
            ("developer_data", "false".to_string()),
        ];
        let endpoint = format!("/coins/{}", urlencoding::encode(id));
        let body = self.fetch(&endpoint, &params).await?;
        parse_coin(&body, Utc::now())
    }

    async fn fetch_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let params = [
            ("vs_currency", currency.to_string()),
            ("days", days.to_string()),
        ];
        let endpoint = format!("/coins/{}/market_chart", urlencoding::encode(id));
        let body = self.fetch(&endpoint, &params).await?;
        parse_market_chart(&body, id, currency, days, Utc::now())
    }

    async fn fetch_global(&self) -> Result<GlobalSnapshot, MarketDataError> {
        let body = self.fetch("/global", &[]).await?;
        parse_global(&body, Utc::now())
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_markets(
    body: &str,
    currency: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<MarketItem>, MarketDataError> {
    let rows: Vec<MarketRow> =
        serde_json::from_str(body).map_err(|e| MarketDataError::parse(PROVIDER_ID, e))?;

    let items: Vec<MarketItem> = rows
        .into_iter()
        .filter_map(|row| {
            // Rows without a price are delisted or not yet tracked
            let price = opt_decimal(row.current_price)?;
            Some(MarketItem {
                image: row.image,
                market_cap: opt_decimal(row.market_cap),
                market_cap_rank: row.market_cap_rank,
                total_volume: opt_decimal(row.total_volume),
                high_24h: opt_decimal(row.high_24h),
                low_24h: opt_decimal(row.low_24h),
                price_change_24h: opt_decimal(row.price_change_24h),
                price_change_percentage_24h: opt_decimal(row.price_change_percentage_24h),
                circulating_supply: opt_decimal(row.circulating_supply),
                total_supply: opt_decimal(row.total_supply),
                max_supply: opt_decimal(row.max_supply),
                ath: opt_decimal(row.ath),
                ath_change_percentage: opt_decimal(row.ath_change_percentage),
                ..MarketItem::new(
                    row.id,
                    row.symbol.to_uppercase(),
                    row.name,
                    currency,
                    price,
                    row.last_updated.unwrap_or(fetched_at),
                    PROVIDER_ID,
                )
            })
        })
        .collect();

    if items.is_empty() {
        return Err(MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        });
    }
    Ok(items)
}

fn parse_coin(body: &str, fetched_at: DateTime<Utc>) -> Result<AssetDetail, MarketDataError> {
    let coin: CoinResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::parse(PROVIDER_ID, e))?;

    let mut detail = AssetDetail::new(
        coin.id,
        coin.symbol.to_uppercase(),
        coin.name,
        coin.last_updated.unwrap_or(fetched_at),
        PROVIDER_ID,
    );
    detail.description = coin
        .description
        .get("en")
        .cloned()
        .flatten()
        .filter(|d| !d.trim().is_empty());
    detail.image = coin.image.and_then(|i| i.large);
    detail.categories = coin.categories.into_iter().flatten().collect();
    detail.links = convert_links(coin.links.unwrap_or_default());

    if let Some(md) = coin.market_data {
        detail.market_data = AssetMarketData {
            current_price: currency_map(md.current_price),
            market_cap: currency_map(md.market_cap),
            total_volume: currency_map(md.total_volume),
            high_24h: currency_map(md.high_24h),
            low_24h: currency_map(md.low_24h),
            price_change_24h: opt_decimal(md.price_change_24h),
            price_change_percentage_24h: opt_decimal(md.price_change_percentage_24h),
            price_change_percentage_7d: opt_decimal(md.price_change_percentage_7d),
            price_change_percentage_30d: opt_decimal(md.price_change_percentage_30d),
            market_cap_change_24h: opt_decimal(md.market_cap_change_24h),
            market_cap_change_percentage_24h: opt_decimal(md.market_cap_change_percentage_24h),
            circulating_supply: opt_decimal(md.circulating_supply),
            total_supply: opt_decimal(md.total_supply),
            max_supply: opt_decimal(md.max_supply),
        };
    }

    Ok(detail)
}

fn parse_market_chart(
    body: &str,
    id: &str,
    currency: &str,
    days: u32,
    fetched_at: DateTime<Utc>,
) -> Result<HistoricalSeries, MarketDataError> {
    let chart: MarketChartResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::parse(PROVIDER_ID, e))?;

    let prices = to_points(&chart.prices);
    if prices.is_empty() {
        return Err(MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        });
    }

    let mut series = HistoricalSeries::new(id, currency, days, prices, fetched_at, PROVIDER_ID);
    series.market_caps = to_points(&chart.market_caps);
    series.total_volumes = to_points(&chart.total_volumes);
    Ok(series.normalize())
}

fn parse_global(body: &str, fetched_at: DateTime<Utc>) -> Result<GlobalSnapshot, MarketDataError> {
    let response: GlobalResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::parse(PROVIDER_ID, e))?;
    let data = response.data;

    let updated_at = data
        .updated_at
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or(fetched_at);

    let mut global = GlobalSnapshot::new(updated_at, PROVIDER_ID);
    global.active_cryptocurrencies = data.active_cryptocurrencies;
    global.markets = data.markets;
    global.total_market_cap = currency_map(data.total_market_cap);
    global.total_volume = currency_map(data.total_volume);
    global.market_cap_percentage = currency_map(data.market_cap_percentage);
    global.market_cap_change_percentage_24h_usd =
        opt_decimal(data.market_cap_change_percentage_24h_usd);
    Ok(global)
}

fn currency_map(values: HashMap<String, Option<f64>>) -> CurrencyMap {
    values
        .into_iter()
        .filter_map(|(k, v)| Some((k.to_ascii_lowercase(), opt_decimal(v)?)))
        .collect()
}

fn to_points(samples: &[(f64, Option<f64>)]) -> Vec<PricePoint> {
    samples
        .iter()
        .filter_map(|(ms, value)| {
            let timestamp = Utc.timestamp_millis_opt(*ms as i64).single()?;
            Some(PricePoint::new(timestamp, to_decimal((*value)?)?))
        })
        .collect()
}

fn non_empty(values: Vec<Option<String>>) -> Vec<String> {
    values
        .into_iter()
        .flatten()
        .filter(|v| !v.trim().is_empty())
        .collect()
}

fn convert_links(links: CoinLinks) -> AssetLinks {
    AssetLinks {
        homepage: non_empty(links.homepage),
        blockchain_site: non_empty(links.blockchain_site),
        official_forum_url: non_empty(links.official_forum_url),
        chat_url: non_empty(links.chat_url),
        announcement_url: non_empty(links.announcement_url),
        twitter_screen_name: links.twitter_screen_name.filter(|v| !v.is_empty()),
        facebook_username: links.facebook_username.filter(|v| !v.is_empty()),
        telegram_channel_identifier: links.telegram_channel_identifier.filter(|v| !v.is_empty()),
        subreddit_url: links.subreddit_url.filter(|v| !v.is_empty()),
        repos_url: non_empty(links.repos_url.unwrap_or_default().github),
    }
}
