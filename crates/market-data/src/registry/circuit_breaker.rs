//! Per-provider circuit breaker for fault tolerance.
//!
//! A provider that keeps failing at the transport level is taken out of
//! rotation for a while instead of being hit on every fetch. The circuit
//! has three states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: Provider is failing, requests are rejected with `CircuitOpen`.
//! - **HalfOpen**: Recovery timeout elapsed; exactly one trial request is let
//!   through and its outcome decides between Closed and Open.
//!
//! [`CircuitBreaker::acquire`] hands out a [`CircuitPermit`]. A trial permit
//! dropped before any outcome is recorded (the caller's future was cancelled)
//! frees the trial slot again.
//!
//! State is in-memory and resets on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::errors::MarketDataError;

/// Default number of consecutive penalised failures before opening.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before letting a trial request through.
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    /// Consecutive penalised failures while Closed.
    failure_count: u32,
    /// When the circuit last opened.
    opened_at: Option<Instant>,
    /// Token of the outstanding HalfOpen trial, if any.
    trial: Option<u64>,
    /// Last trial token handed out.
    trial_seq: u64,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            trial: None,
            trial_seq: 0,
        }
    }

    fn start_trial(&mut self) -> u64 {
        self.trial_seq += 1;
        self.trial = Some(self.trial_seq);
        self.trial_seq
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.trial = None;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
        self.trial = None;
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive penalised failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time an open circuit waits before allowing a trial request.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

/// Point-in-time view of one provider's circuit.
#[derive(Clone, Debug)]
pub struct CircuitStatus {
    pub provider: String,
    pub state: CircuitState,
    pub failure_count: u32,
}

/// Permission to call one provider, returned by [`CircuitBreaker::acquire`].
///
/// Keep it alive until the outcome has been recorded.
#[must_use = "dropping the permit releases a HalfOpen trial slot"]
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    provider: String,
    trial: Option<u64>,
}

impl CircuitPermit<'_> {
    /// Whether this permit holds the HalfOpen trial slot.
    pub fn is_trial(&self) -> bool {
        self.trial.is_some()
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.trial {
            self.breaker.abandon_trial(&self.provider, token);
        }
    }
}

/// Thread-safe per-provider circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
        }
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a slightly wrong circuit state,
    /// which is better than panicking inside a fetch.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Ask permission to call `provider`.
    ///
    /// Transitions Open -> HalfOpen once the recovery timeout has elapsed and
    /// hands out the single trial slot. Returns `CircuitOpen` otherwise.
    pub fn acquire(&self, provider: &str) -> Result<CircuitPermit<'_>, MarketDataError> {
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        let permit = |trial| CircuitPermit {
            breaker: self,
            provider: provider.to_string(),
            trial,
        };

        match circuit.state {
            CircuitState::Closed => return Ok(permit(None)),
            CircuitState::Open => {
                let elapsed = circuit
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    info!(
                        "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                        provider
                    );
                    circuit.state = CircuitState::HalfOpen;
                    return Ok(permit(Some(circuit.start_trial())));
                }
            }
            CircuitState::HalfOpen if circuit.trial.is_none() => {
                return Ok(permit(Some(circuit.start_trial())));
            }
            CircuitState::HalfOpen => {}
        }

        debug!("Circuit breaker: rejecting call to '{}'", provider);
        Err(MarketDataError::CircuitOpen {
            provider: provider.to_string(),
        })
    }

    /// Record a successful call. Closes a HalfOpen circuit.
    pub fn record_success(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        if circuit.state == CircuitState::HalfOpen {
            info!("Circuit breaker: closing circuit for '{}'", provider);
        }
        circuit.close();
    }

    /// Record a penalised failure.
    ///
    /// Opens the circuit once the threshold is reached; a failed HalfOpen
    /// trial reopens it immediately.
    pub fn record_failure(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed => {
                circuit.failure_count += 1;
                if circuit.failure_count >= self.config.failure_threshold {
                    info!(
                        "Circuit breaker: opening circuit for '{}' after {} failures",
                        provider, circuit.failure_count
                    );
                    circuit.open();
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        provider, circuit.failure_count, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                info!(
                    "Circuit breaker: reopening circuit for '{}' after failed trial",
                    provider
                );
                circuit.open();
            }
            CircuitState::Open => {}
        }
    }

    /// Record an outcome that says nothing about provider health (e.g. the
    /// provider answered but had no data). Frees the HalfOpen trial slot.
    pub fn record_neutral(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        if let Some(circuit) = circuits.get_mut(provider) {
            circuit.trial = None;
        }
    }

    /// Free a trial slot whose permit was dropped without an outcome.
    fn abandon_trial(&self, provider: &str, token: u64) {
        let mut circuits = self.lock_circuits();
        if let Some(circuit) = circuits.get_mut(provider) {
            if circuit.state == CircuitState::HalfOpen && circuit.trial == Some(token) {
                debug!("Circuit breaker: trial for '{}' abandoned", provider);
                circuit.trial = None;
            }
        }
    }

    pub fn state(&self, provider: &str) -> CircuitState {
        self.lock_circuits()
            .get(provider)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Reset a provider's circuit to Closed.
    pub fn reset(&self, provider: &str) {
        if let Some(circuit) = self.lock_circuits().get_mut(provider) {
            info!("Circuit breaker: manually resetting circuit for '{}'", provider);
            circuit.close();
        }
    }

    /// Status of every provider seen so far.
    pub fn statuses(&self) -> Vec<CircuitStatus> {
        let mut statuses: Vec<CircuitStatus> = self
            .lock_circuits()
            .iter()
            .map(|(provider, circuit)| CircuitStatus {
                provider: provider.clone(),
                state: circuit.state,
                failure_count: circuit.failure_count,
            })
            .collect();
        statuses.sort_by(|a, b| a.provider.cmp(&b.provider));
        statuses
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
