use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{AssetId, Currency};

/// A single `(timestamp, value)` sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, value: Decimal) -> Self {
        Self { timestamp, value }
    }
}

/// Price history of one asset over a trailing window of days.
///
/// `prices`, `market_caps` and `total_volumes` are each strictly ascending
/// by timestamp once [`normalize`](Self::normalize) has run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub id: AssetId,
    /// Ticker symbol when the source reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub currency: Currency,
    /// Window length the series was requested for
    pub days: u32,
    pub prices: Vec<PricePoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub market_caps: Vec<PricePoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub total_volumes: Vec<PricePoint>,
    /// When the series was fetched
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

impl HistoricalSeries {
    pub fn new(
        id: impl Into<AssetId>,
        currency: impl Into<Currency>,
        days: u32,
        prices: Vec<PricePoint>,
        last_updated: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: None,
            currency: currency.into(),
            days,
            prices,
            market_caps: Vec::new(),
            total_volumes: Vec::new(),
            last_updated,
            source: source.into(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Sort every sequence by timestamp and drop duplicate timestamps,
    /// keeping the sample that came last.
    pub fn normalize(mut self) -> Self {
        normalize_points(&mut self.prices);
        normalize_points(&mut self.market_caps);
        normalize_points(&mut self.total_volumes);
        self
    }

    /// True when every sequence is strictly increasing by timestamp.
    pub fn is_strictly_ascending(&self) -> bool {
        [&self.prices, &self.market_caps, &self.total_volumes]
            .iter()
            .all(|points| points.windows(2).all(|w| w[0].timestamp < w[1].timestamp))
    }

    /// Most recent price sample, if any.
    pub fn latest_price(&self) -> Option<&PricePoint> {
        self.prices.last()
    }
}

fn normalize_points(points: &mut Vec<PricePoint>) {
    // Stable sort keeps provider order among equal timestamps, so the last
    // duplicate is the one that survives.
    points.sort_by_key(|p| p.timestamp);
    let mut out: Vec<PricePoint> = Vec::with_capacity(points.len());
    for point in points.drain(..) {
        match out.last_mut() {
            Some(last) if last.timestamp == point.timestamp => *last = point,
            _ => out.push(point),
        }
    }
    *points = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_normalize_sorts_and_dedupes() {
        let series = HistoricalSeries::new(
            "bitcoin",
            "usd",
            7,
            vec![
                PricePoint::new(ts(30), dec!(3)),
                PricePoint::new(ts(10), dec!(1)),
                PricePoint::new(ts(20), dec!(2)),
                PricePoint::new(ts(20), dec!(22)),
            ],
            Utc::now(),
            "COINGECKO",
        )
        .normalize();

        let values: Vec<_> = series.prices.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![dec!(1), dec!(22), dec!(3)]);
        assert!(series.is_strictly_ascending());
        assert_eq!(series.latest_price().map(|p| p.value), Some(dec!(3)));
    }

    #[test]
    fn test_unsorted_series_is_not_ascending() {
        let series = HistoricalSeries::new(
            "bitcoin",
            "usd",
            1,
            vec![PricePoint::new(ts(2), dec!(1)), PricePoint::new(ts(1), dec!(1))],
            Utc::now(),
            "X",
        );
        assert!(!series.is_strictly_ascending());
    }
}
