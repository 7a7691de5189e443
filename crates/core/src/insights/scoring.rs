//! Pluggable indicator scoring.

use chrono::Utc;
use rust_decimal::Decimal;

use cryptofolio_market_data::HistoricalSeries;

use super::insights_model::{AnalysisSummary, Indicator, Signal, TechnicalAnalysis};

/// Turns a price series into a technical analysis.
pub trait IndicatorScorer: Send + Sync {
    fn score(&self, symbol: &str, series: &HistoricalSeries) -> TechnicalAnalysis;
}

/// Price-change scorer.
///
/// Compares the latest price with the first price of the series and with
/// the price `short_window` points back. Moves beyond `threshold_pct` give a
/// buy or sell signal.
#[derive(Debug, Clone)]
pub struct MomentumScorer {
    pub short_window: usize,
    /// Percent move that turns a signal on.
    pub threshold_pct: Decimal,
}

impl Default for MomentumScorer {
    fn default() -> Self {
        Self {
            short_window: 7,
            threshold_pct: Decimal::from(5),
        }
    }
}

impl MomentumScorer {
    fn change_pct(from: Decimal, to: Decimal) -> Decimal {
        if from.is_zero() {
            return Decimal::ZERO;
        }
        ((to - from) / from * Decimal::ONE_HUNDRED).round_dp(2)
    }

    fn signal_for(&self, change: Decimal) -> Signal {
        if change >= self.threshold_pct {
            Signal::Buy
        } else if change <= -self.threshold_pct {
            Signal::Sell
        } else {
            Signal::Neutral
        }
    }
}

impl IndicatorScorer for MomentumScorer {
    fn score(&self, symbol: &str, series: &HistoricalSeries) -> TechnicalAnalysis {
        let prices = &series.prices;
        let mut indicators = Vec::new();

        if let (Some(first), Some(last)) = (prices.first(), prices.last()) {
            let change = Self::change_pct(first.value, last.value);
            indicators.push(Indicator {
                name: format!("change_{}d", series.days),
                value: change,
                signal: self.signal_for(change),
            });

            let start = prices.len().saturating_sub(self.short_window + 1);
            let short = Self::change_pct(prices[start].value, last.value);
            indicators.push(Indicator {
                name: format!("change_{}p", self.short_window),
                value: short,
                signal: self.signal_for(short),
            });
        }

        let buys = indicators.iter().filter(|i| i.signal == Signal::Buy).count();
        let sells = indicators.iter().filter(|i| i.signal == Signal::Sell).count();
        let signal = match buys.cmp(&sells) {
            std::cmp::Ordering::Greater => Signal::Buy,
            std::cmp::Ordering::Less => Signal::Sell,
            std::cmp::Ordering::Equal => Signal::Neutral,
        };
        let strength = if indicators.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(buys.max(sells)) / Decimal::from(indicators.len())
        };

        let description = match indicators.first() {
            Some(trend) => format!(
                "{} moved {}% over {} days",
                symbol, trend.value, series.days
            ),
            None => format!("No price data for {}", symbol),
        };

        TechnicalAnalysis {
            symbol: symbol.to_string(),
            indicators,
            summary: AnalysisSummary {
                signal,
                strength,
                description,
            },
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use cryptofolio_market_data::PricePoint;
    use rust_decimal_macros::dec;

    fn series(values: &[Decimal]) -> HistoricalSeries {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let prices = values
            .iter()
            .enumerate()
            .map(|(i, v)| PricePoint::new(start + Duration::days(i as i64), *v))
            .collect();
        HistoricalSeries::new("bitcoin", "usd", 30, prices, Utc::now(), "TEST")
    }

    #[test]
    fn test_rising_series_is_buy() {
        let analysis = MomentumScorer::default().score("BTC", &series(&[dec!(100), dec!(110), dec!(120)]));

        assert_eq!(analysis.indicators[0].value, dec!(20));
        assert_eq!(analysis.summary.signal, Signal::Buy);
        assert_eq!(analysis.summary.strength, dec!(1));
    }

    #[test]
    fn test_falling_series_is_sell() {
        let analysis = MomentumScorer::default().score("BTC", &series(&[dec!(100), dec!(80)]));
        assert_eq!(analysis.summary.signal, Signal::Sell);
    }

    #[test]
    fn test_flat_series_is_neutral() {
        let analysis = MomentumScorer::default().score("BTC", &series(&[dec!(100), dec!(101)]));
        assert_eq!(analysis.summary.signal, Signal::Neutral);
        assert_eq!(analysis.summary.strength, dec!(0));
    }

    #[test]
    fn test_empty_series() {
        let analysis = MomentumScorer::default().score("BTC", &series(&[]));
        assert!(analysis.indicators.is_empty());
        assert_eq!(analysis.summary.signal, Signal::Neutral);
    }
}
