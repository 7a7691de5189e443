//! Market insights - technical scoring and sentiment, both pluggable.

mod board;
mod insights_model;
mod scoring;
mod sentiment;

pub use board::InsightBoard;
pub use insights_model::{AnalysisSummary, Indicator, SentimentReading, Signal, TechnicalAnalysis};
pub use scoring::{IndicatorScorer, MomentumScorer};
pub use sentiment::{NeutralSentimentSource, SentimentSource};
