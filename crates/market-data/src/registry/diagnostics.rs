//! Per-fetch attempt tracking.
//!
//! Every registry fetch records what happened with each provider so that a
//! total failure can say exactly which attempts were made and why each one
//! failed.

use std::time::Duration;

use crate::models::ProviderId;

/// Why a provider was not called at all.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// Circuit breaker is open for this provider.
    CircuitBreakerOpen,
}

/// Outcome of one provider attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome {
    Success,
    Failed(String),
    Skipped(SkipReason),
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub outcome: AttemptOutcome,
    /// Wall time spent on the call; zero for skips.
    pub elapsed: Duration,
}

/// Attempt log of one registry fetch.
#[derive(Clone, Debug)]
pub struct FetchDiagnostics {
    pub operation: &'static str,
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome: AttemptOutcome::Skipped(reason),
            elapsed: Duration::ZERO,
        });
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: String, elapsed: Duration) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome: AttemptOutcome::Failed(error),
            elapsed,
        });
    }

    pub fn record_success(&mut self, provider_id: ProviderId, elapsed: Duration) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome: AttemptOutcome::Success,
            elapsed,
        });
    }

    /// Summary for logging and for the aggregate error.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return format!("{}: no providers configured", self.operation);
        }
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success => format!("{}: SUCCESS", a.provider_id),
                AttemptOutcome::Skipped(reason) => {
                    format!("{}: SKIPPED ({:?})", a.provider_id, reason)
                }
                AttemptOutcome::Failed(err) => format!("{}: ERROR ({})", a.provider_id, err),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome == AttemptOutcome::Success)
    }

    /// Providers in the order they were tried.
    pub fn attempted(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.provider_id.as_ref()).collect()
    }
}
