use std::collections::HashMap;
use std::sync::RwLock;

use log::warn;

use super::insights_model::{SentimentReading, TechnicalAnalysis};

/// Latest insight per symbol. Each publish replaces the previous record.
#[derive(Default)]
pub struct InsightBoard {
    analyses: RwLock<HashMap<String, TechnicalAnalysis>>,
    sentiments: RwLock<HashMap<String, SentimentReading>>,
}

fn recover<T>(result: Result<T, std::sync::PoisonError<T>>) -> T {
    result.unwrap_or_else(|poisoned| {
        warn!("Insight board lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl InsightBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_analysis(&self, analysis: TechnicalAnalysis) {
        recover(self.analyses.write()).insert(analysis.symbol.clone(), analysis);
    }

    pub fn publish_sentiment(&self, reading: SentimentReading) {
        recover(self.sentiments.write()).insert(reading.symbol.clone(), reading);
    }

    pub fn analysis(&self, symbol: &str) -> Option<TechnicalAnalysis> {
        recover(self.analyses.read()).get(symbol).cloned()
    }

    pub fn sentiment(&self, symbol: &str) -> Option<SentimentReading> {
        recover(self.sentiments.read()).get(symbol).cloned()
    }

    /// All analyses, sorted by symbol.
    pub fn analyses(&self) -> Vec<TechnicalAnalysis> {
        let mut all: Vec<_> = recover(self.analyses.read()).values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{NeutralSentimentSource, SentimentSource};

    #[tokio::test]
    async fn test_publish_replaces_previous_reading() {
        let board = InsightBoard::new();
        let source = NeutralSentimentSource;

        let first = source.sentiment("BTC").await.unwrap();
        board.publish_sentiment(first);
        let mut second = source.sentiment("BTC").await.unwrap();
        second.positive = 3;
        board.publish_sentiment(second);

        assert_eq!(board.sentiment("BTC").unwrap().positive, 3);
        assert!(board.sentiment("ETH").is_none());
        assert!(board.analyses().is_empty());
    }
}
