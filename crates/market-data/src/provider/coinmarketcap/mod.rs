//! CoinMarketCap market data provider implementation.
//!
//! CoinMarketCap is read from its public web pages rather than the keyed API:
//! - Market snapshot from the listing table on the home page (USD only)
//! - Asset detail from /currencies/{id}/
//! - Global totals from the stats header
//!
//! The pages carry no price history, so a history request degrades to a
//! single point holding the current price from the detail page.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{debug, warn};
use num_traits::ToPrimitive;
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};

use super::http::{build_client, get_text};
use crate::errors::MarketDataError;
use crate::models::{AssetDetail, GlobalSnapshot, HistoricalSeries, MarketItem, PricePoint};
use crate::provider::MarketDataProvider;

const BASE_URL: &str = "https://coinmarketcap.com";
const PROVIDER_ID: &str = "COINMARKETCAP";

/// The listing and detail pages only render USD figures.
const PAGE_CURRENCY: &str = "usd";

lazy_static! {
    static ref ROW: Selector = Selector::parse("table tbody tr").expect("Invalid selector");
    static ref CELL: Selector = Selector::parse("td").expect("Invalid selector");
    static ref LINK: Selector = Selector::parse("a[href]").expect("Invalid selector");
    static ref IMG: Selector = Selector::parse("img[src]").expect("Invalid selector");
    static ref NAME: Selector =
        Selector::parse("p.coin-item-name, .crypto-symbol").expect("Invalid selector");
    static ref SYMBOL: Selector =
        Selector::parse("p.coin-item-symbol, .coin-item-symbol").expect("Invalid selector");

    static ref DETAIL_NAME: Selector =
        Selector::parse("[data-role='coin-name'], h1").expect("Invalid selector");
    static ref DETAIL_SYMBOL: Selector =
        Selector::parse("[data-role='coin-symbol'], small.nameSymbol").expect("Invalid selector");
    static ref DETAIL_PRICE: Selector =
        Selector::parse("[data-test='text-cdp-price-display'], div.priceValue")
            .expect("Invalid selector");
    static ref DETAIL_LOGO: Selector =
        Selector::parse("[data-role='coin-logo'] img, img.coin-logo-sprite")
            .expect("Invalid selector");
    static ref DETAIL_STAT: Selector =
        Selector::parse("dd, div.statsValue").expect("Invalid selector");
    static ref DETAIL_DESCRIPTION: Selector =
        Selector::parse("#section-coin-about p, div.sc-1lt0cju-0").expect("Invalid selector");
    static ref DETAIL_TAG: Selector =
        Selector::parse("div.tagBadge, [data-role='coin-tag']").expect("Invalid selector");
    static ref DETAIL_LINK: Selector =
        Selector::parse("[data-role='coin-links'] a[href], div.sc-19zk94m-5 a[href]")
            .expect("Invalid selector");

    static ref GLOBAL_STATS: Selector =
        Selector::parse("div.cmc-global-stats__inner-content, [data-role='global-header']")
            .expect("Invalid selector");
}

/// CoinMarketCap page extraction client.
pub struct CoinMarketCapProvider {
    client: Client,
    base_url: String,
}

impl CoinMarketCapProvider {
    pub fn new() -> Self {
        Self {
            client: build_client(),
            base_url: BASE_URL.to_string(),
        }
    }

    async fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<String, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        get_text(&self.client, PROVIDER_ID, &url, params).await
    }

    async fn detail_page(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        let path = format!("/currencies/{}/", urlencoding::encode(id));
        let body = self.fetch(&path, &[]).await?;
        parse_detail_page(&body, id, Utc::now())
    }
}

impl Default for CoinMarketCapProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for CoinMarketCapProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
    }

    async fn fetch_snapshot(
        &self,
        currency: &str,
        limit: u32,
    ) -> Result<Vec<MarketItem>, MarketDataError> {
        if currency != PAGE_CURRENCY {
            return Err(MarketDataError::not_supported(PROVIDER_ID, "non-USD snapshot"));
        }
        let body = self.fetch("/", &[("limit", limit.to_string())]).await?;
        let mut items = parse_listing(&body, Utc::now())?;
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn fetch_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        self.detail_page(id).await
    }

    async fn fetch_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries, MarketDataError> {
        if currency != PAGE_CURRENCY {
            return Err(MarketDataError::not_supported(PROVIDER_ID, "non-USD history"));
        }
        let detail = self.detail_page(id).await?;
        warn!(
            "{} has no price history for '{}', returning current price only",
            PROVIDER_ID, id
        );
        current_price_series(&detail, currency, days)
    }

    async fn fetch_global(&self) -> Result<GlobalSnapshot, MarketDataError> {
        let body = self.fetch("/", &[]).await?;
        parse_global_stats(&body, Utc::now())
    }
}

// ============================================================================
// Text helpers
// ============================================================================

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(text_of)
}

/// Parse `"$1,234.56"` or `"-0.5%"` into a decimal.
fn parse_number(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parse an abbreviated amount such as `"$2.41T"` or `"$96.3B"`.
fn parse_magnitude(text: &str) -> Option<Decimal> {
    let trimmed = text.trim().trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    let multiplier = match trimmed.chars().last()?.to_ascii_uppercase() {
        'T' => Decimal::from(1_000_000_000_000i64),
        'B' => Decimal::from(1_000_000_000i64),
        'M' => Decimal::from(1_000_000i64),
        'K' => Decimal::from(1_000i64),
        _ => Decimal::ONE,
    };
    parse_number(trimmed).map(|value| value * multiplier)
}

/// The token immediately following `label` in `text`.
fn value_after<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let start = text.find(label)? + label.len();
    text[start..].split_whitespace().next()
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_listing(body: &str, fetched_at: DateTime<Utc>) -> Result<Vec<MarketItem>, MarketDataError> {
    let document = Html::parse_document(body);
    let mut items = Vec::new();

    for row in document.select(&ROW) {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        if cells.len() < 8 {
            continue;
        }
        let coin_cell = cells[2];

        // Coin links look like /currencies/bitcoin/
        let Some(id) = coin_cell
            .select(&LINK)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| href.split('/').nth(2).filter(|s| !s.is_empty()))
        else {
            continue;
        };
        let Some(price) = parse_number(&text_of(cells[3])) else {
            debug!("{}: skipping '{}' without a price", PROVIDER_ID, id);
            continue;
        };

        let name = coin_cell.select(&NAME).next().map(text_of).unwrap_or_default();
        let symbol = coin_cell.select(&SYMBOL).next().map(text_of).unwrap_or_default();

        let mut item = MarketItem::new(
            id,
            symbol.to_uppercase(),
            if name.is_empty() { id.to_string() } else { name },
            PAGE_CURRENCY,
            price,
            fetched_at,
            PROVIDER_ID,
        );
        item.image = coin_cell
            .select(&IMG)
            .filter_map(|img| img.value().attr("src"))
            .next()
            .map(str::to_string);
        item.price_change_percentage_24h = parse_number(&text_of(cells[4]));
        item.market_cap = parse_number(&text_of(cells[6]));
        item.total_volume = parse_number(&text_of(cells[7]));
        item.market_cap_rank = text_of(cells[1]).trim().parse::<u32>().ok();
        items.push(item);
    }

    if items.is_empty() {
        return Err(MarketDataError::parse(PROVIDER_ID, "no rows in listing table"));
    }
    Ok(items)
}

fn parse_detail_page(
    body: &str,
    id: &str,
    fetched_at: DateTime<Utc>,
) -> Result<AssetDetail, MarketDataError> {
    let document = Html::parse_document(body);

    let price = first_text(&document, &DETAIL_PRICE)
        .as_deref()
        .and_then(parse_number)
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "price not found on detail page"))?;

    let name = first_text(&document, &DETAIL_NAME).unwrap_or_else(|| id.to_string());
    let symbol = first_text(&document, &DETAIL_SYMBOL)
        .unwrap_or_default()
        .to_uppercase();

    let mut detail = AssetDetail::new(id, symbol, name, fetched_at, PROVIDER_ID);
    detail.image = document
        .select(&DETAIL_LOGO)
        .filter_map(|img| img.value().attr("src"))
        .next()
        .map(str::to_string);
    detail.description = first_text(&document, &DETAIL_DESCRIPTION).filter(|d| !d.is_empty());
    detail.categories = document
        .select(&DETAIL_TAG)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();

    // Stats render in a fixed order: market cap, volume, circulating supply
    let stats: Vec<String> = document.select(&DETAIL_STAT).map(text_of).collect();
    let md = &mut detail.market_data;
    md.current_price.insert(PAGE_CURRENCY.to_string(), price);
    if let Some(market_cap) = stats.first().and_then(|s| parse_number(s)) {
        md.market_cap.insert(PAGE_CURRENCY.to_string(), market_cap);
    }
    if let Some(volume) = stats.get(1).and_then(|s| parse_number(s)) {
        md.total_volume.insert(PAGE_CURRENCY.to_string(), volume);
    }
    md.circulating_supply = stats.get(2).and_then(|s| parse_number(s));

    for link in document.select(&DETAIL_LINK) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let label = text_of(link).to_lowercase();
        let links = &mut detail.links;
        if label.contains("website") {
            links.homepage.push(href.to_string());
        } else if label.contains("explorer") {
            links.blockchain_site.push(href.to_string());
        } else if label.contains("forum") {
            links.official_forum_url.push(href.to_string());
        } else if label.contains("reddit") {
            links.subreddit_url = Some(href.to_string());
        } else if label.contains("twitter") {
            links.twitter_screen_name = href.rsplit('/').find(|s| !s.is_empty()).map(str::to_string);
        } else if label.contains("facebook") {
            links.facebook_username = href.rsplit('/').find(|s| !s.is_empty()).map(str::to_string);
        } else if label.contains("github") {
            links.repos_url.push(href.to_string());
        } else if label.contains("chat") {
            links.chat_url.push(href.to_string());
        }
    }

    Ok(detail)
}

fn current_price_series(
    detail: &AssetDetail,
    currency: &str,
    days: u32,
) -> Result<HistoricalSeries, MarketDataError> {
    let price = detail
        .market_data
        .current_price
        .get(currency)
        .copied()
        .ok_or_else(|| MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        })?;

    let series = HistoricalSeries::new(
        detail.id.clone(),
        currency,
        days,
        vec![PricePoint::new(detail.last_updated, price)],
        detail.last_updated,
        PROVIDER_ID,
    );
    Ok(if detail.symbol.is_empty() {
        series
    } else {
        series.with_symbol(detail.symbol.clone())
    })
}

fn parse_global_stats(body: &str, fetched_at: DateTime<Utc>) -> Result<GlobalSnapshot, MarketDataError> {
    let document = Html::parse_document(body);
    let text = document
        .select(&GLOBAL_STATS)
        .next()
        .map(text_of)
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "global stats header not found"))?;

    let mut global = GlobalSnapshot::new(fetched_at, PROVIDER_ID);
    let count = |label: &str| {
        value_after(&text, label)
            .and_then(parse_number)
            .and_then(|d| d.to_u32())
    };
    global.active_cryptocurrencies = count("Cryptos:").unwrap_or(0);
    global.markets = count("Exchanges:").unwrap_or(0);

    if let Some(cap) = value_after(&text, "Market Cap:").and_then(parse_magnitude) {
        global.total_market_cap.insert(PAGE_CURRENCY.to_string(), cap);
    }
    if let Some(volume) = value_after(&text, "24h Vol:").and_then(parse_magnitude) {
        global.total_volume.insert(PAGE_CURRENCY.to_string(), volume);
    }
    if let Some(btc) = value_after(&text, "BTC:").and_then(parse_number) {
        global.market_cap_percentage.insert("btc".to_string(), btc);
    }
    if let Some(eth) = value_after(&text, "ETH:").and_then(parse_number) {
        global.market_cap_percentage.insert("eth".to_string(), eth);
    }

    if global.active_cryptocurrencies == 0 && global.total_market_cap.is_empty() {
        return Err(MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        });
    }
    Ok(global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const LISTING: &str = r#"
        <html><body><table><tbody>
          <tr>
            <td></td><td>1</td>
            <td><a href="/currencies/bitcoin/"><img src="https://s2/btc.png"/>
                <p class="coin-item-name">Bitcoin</p><p class="coin-item-symbol">btc</p></a></td>
            <td>$64,000.50</td><td>-0.25%</td><td>1.1%</td>
            <td>$1,260,000,000,000</td><td>$31,000,000,000</td>
          </tr>
          <tr>
            <td></td><td>2</td>
            <td><a href="/currencies/ethereum/"><p class="coin-item-name">Ethereum</p>
                <p class="coin-item-symbol">ETH</p></a></td>
            <td>$3,000.25</td><td>1.5%</td><td>0%</td><td>$360,000,000,000</td><td>$12,000,000,000</td>
          </tr>
          <tr><td>ad</td></tr>
        </tbody></table></body></html>"#;

    #[test]
    fn test_provider_id() {
        let provider = CoinMarketCapProvider::new();
        assert_eq!(provider.id(), "COINMARKETCAP");
        assert_eq!(provider.priority(), 3);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("$1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_number("-0.25%"), Some(dec!(-0.25)));
        assert_eq!(parse_number("--"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_parse_magnitude() {
        assert_eq!(parse_magnitude("$2.41T"), Some(dec!(2410000000000)));
        assert_eq!(parse_magnitude("$96.3B"), Some(dec!(96300000000)));
        assert_eq!(parse_magnitude("$500"), Some(dec!(500)));
    }

    #[test]
    fn test_parse_listing() {
        let items = parse_listing(LISTING, Utc::now()).unwrap();
        assert_eq!(items.len(), 2);

        let btc = &items[0];
        assert_eq!(btc.id, "bitcoin");
        assert_eq!(btc.symbol, "BTC");
        assert_eq!(btc.name, "Bitcoin");
        assert_eq!(btc.current_price, dec!(64000.50));
        assert_eq!(btc.price_change_percentage_24h, Some(dec!(-0.25)));
        assert_eq!(btc.market_cap, Some(dec!(1260000000000)));
        assert_eq!(btc.market_cap_rank, Some(1));
        assert_eq!(btc.image.as_deref(), Some("https://s2/btc.png"));
        assert_eq!(btc.source, "COINMARKETCAP");
    }

    #[test]
    fn test_parse_listing_without_table() {
        let result = parse_listing("<html><body>blocked</body></html>", Utc::now());
        assert!(matches!(result, Err(MarketDataError::ParseFailure { .. })));
    }

    #[test]
    fn test_parse_detail_page_and_single_point_history() {
        let body = r#"
            <html><body>
              <span data-role="coin-name">Solana</span>
              <span data-role="coin-symbol">sol</span>
              <span data-test="text-cdp-price-display">$145.20</span>
              <dl><dd>$65,000,000,000</dd><dd>$2,100,000,000</dd><dd>447,000,000 SOL</dd></dl>
              <div data-role="coin-links">
                <a href="https://solana.com">Website</a>
                <a href="https://twitter.com/solana">Twitter</a>
              </div>
            </body></html>"#;

        let detail = parse_detail_page(body, "solana", Utc::now()).unwrap();
        assert_eq!(detail.name, "Solana");
        assert_eq!(detail.symbol, "SOL");
        assert_eq!(detail.market_data.current_price.get("usd"), Some(&dec!(145.20)));
        assert_eq!(detail.market_data.total_volume.get("usd"), Some(&dec!(2100000000)));
        assert_eq!(detail.market_data.circulating_supply, Some(dec!(447000000)));
        assert_eq!(detail.links.homepage, vec!["https://solana.com"]);
        assert_eq!(detail.links.twitter_screen_name.as_deref(), Some("solana"));

        let series = current_price_series(&detail, "usd", 7).unwrap();
        assert_eq!(series.prices.len(), 1);
        assert_eq!(series.prices[0].value, dec!(145.20));
        assert_eq!(series.symbol.as_deref(), Some("SOL"));
    }

    #[test]
    fn test_parse_detail_page_without_price() {
        let result = parse_detail_page("<html><h1>Solana</h1></html>", "solana", Utc::now());
        assert!(matches!(result, Err(MarketDataError::ParseFailure { .. })));
    }

    #[test]
    fn test_parse_global_stats() {
        let body = r#"<div class="cmc-global-stats__inner-content">
            Cryptos: 2,400,000 Exchanges: 780 Market Cap: $2.41T 24h Vol: $96.3B
            Dominance: BTC: 52.1% ETH: 16.4%</div>"#;

        let global = parse_global_stats(body, Utc::now()).unwrap();
        assert_eq!(global.active_cryptocurrencies, 2_400_000);
        assert_eq!(global.markets, 780);
        assert_eq!(global.total_market_cap.get("usd"), Some(&dec!(2410000000000)));
        assert_eq!(global.total_volume.get("usd"), Some(&dec!(96300000000)));
        assert_eq!(global.market_cap_percentage.get("btc"), Some(&dec!(52.1)));
        assert_eq!(global.market_cap_percentage.get("eth"), Some(&dec!(16.4)));
    }
}
