//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining failover behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the provider registry should handle the error.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider could not be reached (DNS, connect, TLS, body read).
    #[error("Provider unreachable: {provider} - {message}")]
    Unreachable {
        /// The provider that could not be reached
        provider: String,
        /// Transport error description
        message: String,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("Bad status from {provider}: HTTP {status}")]
    BadStatus {
        /// The provider that returned the status
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be turned into a record.
    #[error("Parse failure from {provider}: {message}")]
    ParseFailure {
        /// The provider whose payload failed to parse
        provider: String,
        /// What went wrong
        message: String,
    },

    /// The provider answered successfully but returned nothing usable.
    #[error("No data from {provider}")]
    NoData {
        /// The provider with an empty result
        provider: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The attempt exceeded its deadline.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider does not implement the requested capability.
    #[error("{provider} does not support {operation}")]
    NotSupported {
        /// The provider lacking the capability
        provider: String,
        /// Capability name (snapshot, detail, history, global)
        operation: String,
    },

    /// The circuit breaker is open for this provider.
    /// Skip this provider until the circuit closes.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// Data validation failed.
    /// The provider returned data that failed validation checks.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// No providers are registered for the request.
    #[error("No providers available")]
    NoProvidersAvailable,

    /// All providers were tried and all failed.
    /// This is a terminal error after exhausting all options.
    #[error("All providers failed: {attempts}")]
    AllProvidersFailed {
        /// Attempt summary, e.g. `COINGECKO: ERROR (Timeout: COINGECKO) -> ...`
        attempts: String,
    },
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use cryptofolio_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "COINGECKO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
    ///
    /// let error = MarketDataError::NoData { provider: "COINGECKO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transport trouble - fail over and count it against the provider
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => {
                RetryClass::FailoverWithPenalty
            }
            Self::BadStatus { status, .. } if *status >= 500 => RetryClass::FailoverWithPenalty,

            // Provider answered but can't serve this request
            Self::BadStatus { .. }
            | Self::ParseFailure { .. }
            | Self::NoData { .. }
            | Self::NotSupported { .. }
            | Self::ValidationFailed { .. } => RetryClass::NextProvider,

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            // Exhausted all options - terminal
            Self::NoProvidersAvailable | Self::AllProvidersFailed { .. } => RetryClass::Never,
        }
    }

    /// Provider the error originated from, if it names one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Unreachable { provider, .. }
            | Self::BadStatus { provider, .. }
            | Self::ParseFailure { provider, .. }
            | Self::NoData { provider }
            | Self::RateLimited { provider }
            | Self::Timeout { provider }
            | Self::NotSupported { provider, .. }
            | Self::CircuitOpen { provider } => Some(provider.as_str()),
            Self::ValidationFailed { .. }
            | Self::NoProvidersAvailable
            | Self::AllProvidersFailed { .. } => None,
        }
    }

    pub(crate) fn not_supported(provider: &str, operation: &str) -> Self {
        Self::NotSupported {
            provider: provider.to_string(),
            operation: operation.to_string(),
        }
    }

    pub(crate) fn parse(provider: &str, message: impl std::fmt::Display) -> Self {
        Self::ParseFailure {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }
}
