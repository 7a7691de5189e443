//! Provider registry for orchestrating market data providers.
//!
//! The registry owns the ordered provider list and implements the two fetch
//! policies:
//! - **Fan-out-merge** (snapshots): every provider is called concurrently and
//!   the successful results are concatenated in completion order.
//! - **Ordered fallback** (detail, history, global): providers are tried one
//!   at a time in priority order until one returns a usable payload.
//!
//! Both policies run each attempt under a deadline, consult the circuit
//! breaker, validate payloads, and fail only once every provider has failed.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};

use super::circuit_breaker::{CircuitBreakerConfig, CircuitStatus};
use super::diagnostics::{FetchDiagnostics, SkipReason};
use super::validator::{Payload, ValidatorConfig};
use super::{CircuitBreaker, PayloadValidator};
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{AssetDetail, GlobalSnapshot, HistoricalSeries, MarketItem, ProviderId};
use crate::provider::MarketDataProvider;

/// Default per-attempt deadline.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry configuration.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Fallback order by provider id. Providers not listed come after the
    /// listed ones, ordered by their own [`MarketDataProvider::priority`].
    pub priority_order: Vec<ProviderId>,
    /// Deadline for a single provider attempt.
    pub fetch_timeout: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
    pub validator: ValidatorConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            priority_order: vec![
                Cow::Borrowed("COINGECKO"),
                Cow::Borrowed("CRYPTOCOMPARE"),
                Cow::Borrowed("COINMARKETCAP"),
            ],
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            circuit_breaker: CircuitBreakerConfig::default(),
            validator: ValidatorConfig::default(),
        }
    }
}

/// Provider registry for orchestrating market data fetching.
pub struct ProviderRegistry {
    /// Providers in fallback order.
    providers: Vec<Arc<dyn MarketDataProvider>>,
    fetch_timeout: Duration,
    circuit_breaker: CircuitBreaker,
    validator: PayloadValidator,
}

impl ProviderRegistry {
    /// Create a registry with the default configuration.
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self::with_config(providers, RegistryConfig::default())
    }

    /// Create a registry with custom configuration.
    pub fn with_config(
        mut providers: Vec<Arc<dyn MarketDataProvider>>,
        config: RegistryConfig,
    ) -> Self {
        providers.sort_by_key(|p| {
            let rank = config
                .priority_order
                .iter()
                .position(|id| id == p.id())
                .unwrap_or(usize::MAX);
            (rank, p.priority())
        });

        Self {
            providers,
            fetch_timeout: config.fetch_timeout,
            circuit_breaker: CircuitBreaker::with_config(config.circuit_breaker),
            validator: PayloadValidator::with_config(config.validator),
        }
    }

    /// Providers in the order fallback tries them.
    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    pub fn circuit_statuses(&self) -> Vec<CircuitStatus> {
        self.circuit_breaker.statuses()
    }

    /// Reset a provider's circuit breaker.
    pub fn reset_circuit(&self, provider_id: &str) {
        self.circuit_breaker.reset(provider_id);
    }

    // ========================================================================
    // Fan-out-merge
    // ========================================================================

    /// Fetch a market snapshot from every provider concurrently.
    ///
    /// Returns the concatenation of every successful provider's items, in the
    /// order the providers completed. Items failing validation are dropped
    /// individually. Fails only when no provider contributed anything.
    pub async fn fetch_snapshot(
        &self,
        currency: &str,
        limit: u32,
    ) -> Result<Vec<MarketItem>, MarketDataError> {
        if self.providers.is_empty() {
            return Err(MarketDataError::NoProvidersAvailable);
        }

        let mut diagnostics = FetchDiagnostics::new("snapshot");
        let mut pending = FuturesUnordered::new();

        for provider in &self.providers {
            let Ok(permit) = self.circuit_breaker.acquire(provider.id()) else {
                debug!("Circuit breaker open for provider '{}', skipping", provider.id());
                diagnostics.record_skip(Cow::Borrowed(provider.id()), SkipReason::CircuitBreakerOpen);
                continue;
            };

            let provider = Arc::clone(provider);
            pending.push(async move {
                let started = Instant::now();
                let result = self
                    .attempt(provider.id(), provider.fetch_snapshot(currency, limit))
                    .await;
                (provider, permit, result, started.elapsed())
            });
        }

        let mut merged: Vec<MarketItem> = Vec::new();
        while let Some((provider, _permit, result, elapsed)) = pending.next().await {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            match result {
                Ok(items) => {
                    self.circuit_breaker.record_success(provider.id());
                    let received = items.len();
                    let valid = self.validator.retain_valid(items);
                    if valid.is_empty() {
                        let error = if received == 0 {
                            MarketDataError::NoData {
                                provider: provider_id.to_string(),
                            }
                        } else {
                            MarketDataError::ValidationFailed {
                                message: format!("all {} items rejected", received),
                            }
                        };
                        warn!("Snapshot from '{}' unusable: {}", provider_id, error);
                        diagnostics.record_error(provider_id, error.to_string(), elapsed);
                        continue;
                    }
                    debug!(
                        "Snapshot from '{}': {} of {} items accepted in {:?}",
                        provider_id,
                        valid.len(),
                        received,
                        elapsed
                    );
                    diagnostics.record_success(provider_id, elapsed);
                    merged.extend(valid);
                }
                Err(e) => {
                    self.penalise(provider.id(), &e);
                    warn!("Snapshot from '{}' failed: {}", provider_id, e);
                    diagnostics.record_error(provider_id, e.to_string(), elapsed);
                }
            }
        }

        if merged.is_empty() {
            warn!("Snapshot failed on every provider: {}", diagnostics.summary());
            return Err(MarketDataError::AllProvidersFailed {
                attempts: diagnostics.summary(),
            });
        }

        info!(
            "Merged snapshot of {} items ({})",
            merged.len(),
            diagnostics.summary()
        );
        Ok(merged)
    }

    // ========================================================================
    // Ordered fallback
    // ========================================================================

    /// Fetch an asset's detail, first usable provider wins.
    pub async fn fetch_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        self.first_success("detail", |provider| async move {
            provider.fetch_detail(id).await
        })
        .await
    }

    /// Fetch an asset's price history, first usable provider wins.
    pub async fn fetch_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries, MarketDataError> {
        self.first_success("history", |provider| async move {
            provider.fetch_history(id, currency, days).await
        })
        .await
    }

    /// Fetch global totals, first usable provider wins.
    pub async fn fetch_global(&self) -> Result<GlobalSnapshot, MarketDataError> {
        self.first_success("global", |provider| async move {
            provider.fetch_global().await
        })
        .await
    }

    /// Try providers in order until one returns a non-empty, valid payload.
    ///
    /// 1. Check circuit breaker for each provider
    /// 2. Call it under the per-attempt deadline
    /// 3. Reject empty or invalid payloads
    /// 4. On failure, penalise according to the retry class and move on
    async fn first_success<T, F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<T, MarketDataError>
    where
        T: Payload,
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        if self.providers.is_empty() {
            return Err(MarketDataError::NoProvidersAvailable);
        }

        let mut diagnostics = FetchDiagnostics::new(operation);

        for provider in &self.providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            // Held until the outcome is recorded; dropping it early frees a trial slot.
            let Ok(_permit) = self.circuit_breaker.acquire(provider.id()) else {
                debug!(
                    "Circuit breaker open for provider '{}', skipping",
                    provider_id
                );
                diagnostics.record_skip(provider_id, SkipReason::CircuitBreakerOpen);
                continue;
            };

            debug!("Fetching {} from provider '{}'", operation, provider_id);
            let started = Instant::now();
            let result = self
                .attempt(provider.id(), call(Arc::clone(provider)))
                .await;
            let elapsed = started.elapsed();

            let error = match result {
                Ok(payload) => {
                    self.circuit_breaker.record_success(provider.id());
                    match self.accept(provider.id(), payload) {
                        Ok(payload) => {
                            info!(
                                "Fetched {} from '{}' in {:?}",
                                payload.label(),
                                provider_id,
                                elapsed
                            );
                            diagnostics.record_success(provider_id, elapsed);
                            return Ok(payload);
                        }
                        Err(e) => e,
                    }
                }
                Err(e) => {
                    self.penalise(provider.id(), &e);
                    e
                }
            };

            info!(
                "Provider '{}' failed {} with {}, trying next provider",
                provider_id, operation, error
            );
            diagnostics.record_error(provider_id, error.to_string(), elapsed);
        }

        warn!(
            "{} failed on every provider: {}",
            operation,
            diagnostics.summary()
        );
        Err(MarketDataError::AllProvidersFailed {
            attempts: diagnostics.summary(),
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Run one provider call under the per-attempt deadline.
    async fn attempt<T>(
        &self,
        provider_id: &str,
        call: impl Future<Output = Result<T, MarketDataError>>,
    ) -> Result<T, MarketDataError> {
        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout {
                provider: provider_id.to_string(),
            }),
        }
    }

    /// Reject empty and invalid payloads.
    fn accept<T: Payload>(&self, provider_id: &str, payload: T) -> Result<T, MarketDataError> {
        if payload.is_empty() {
            return Err(MarketDataError::NoData {
                provider: provider_id.to_string(),
            });
        }
        self.validator.validate(&payload)?;
        Ok(payload)
    }

    /// Feed a failed attempt into the circuit breaker.
    fn penalise(&self, provider_id: &str, error: &MarketDataError) {
        match error.retry_class() {
            RetryClass::FailoverWithPenalty => {
                self.circuit_breaker.record_failure(provider_id);
                warn!(
                    "Provider '{}' failed with {}, recorded circuit breaker failure",
                    provider_id, error
                );
            }
            RetryClass::CircuitOpen => {}
            RetryClass::NextProvider | RetryClass::Never => {
                self.circuit_breaker.record_neutral(provider_id);
            }
        }
    }
}
