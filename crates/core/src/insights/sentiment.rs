//! Pluggable sentiment collection.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::insights_model::SentimentReading;
use crate::errors::Result;

#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn sentiment(&self, symbol: &str) -> Result<SentimentReading>;
}

/// Reports every asset as neutral.
#[derive(Debug, Clone, Default)]
pub struct NeutralSentimentSource;

#[async_trait]
impl SentimentSource for NeutralSentimentSource {
    async fn sentiment(&self, symbol: &str) -> Result<SentimentReading> {
        Ok(SentimentReading {
            symbol: symbol.to_string(),
            score: Decimal::new(5, 1),
            source: "NEUTRAL".to_string(),
            positive: 0,
            negative: 0,
            neutral: 0,
            timestamp: Utc::now(),
        })
    }
}
