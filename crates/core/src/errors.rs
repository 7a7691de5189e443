//! Core error types for the Cryptofolio aggregation core.
//!
//! This module defines storage-agnostic error types. Concrete store
//! implementations convert their own failures into [`StoreError`].

use thiserror::Error;

use cryptofolio_market_data::errors::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the aggregation core.
#[derive(Error, Debug)]
pub enum Error {
    /// Every provider was tried (or no provider was usable).
    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Scheduler lifecycle misuse (double start, double stop).
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Invalid configuration value: {0}")]
    Config(String),
}

/// Storage-agnostic error type for `MarketStore` operations.
///
/// Uses `String` details so any backend can convert into it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A read failed to execute.
    #[error("Store query failed: {0}")]
    QueryFailed(String),

    /// A write failed to execute.
    #[error("Store write failed: {0}")]
    WriteFailed(String),
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_data_error_converts() {
        let err: Error = MarketDataError::NoProvidersAvailable.into();
        assert!(matches!(err, Error::MarketData(_)));
        assert_eq!(
            err.to_string(),
            "Market data operation failed: No providers available"
        );
    }

    #[test]
    fn test_store_error_message() {
        let err: Error = StoreError::WriteFailed("disk full".to_string()).into();
        assert_eq!(
            String::from(err),
            "Store operation failed: Store write failed: disk full"
        );
    }
}
