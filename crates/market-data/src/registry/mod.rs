//! Provider registry module.
//!
//! This module provides orchestration for market data providers, including:
//! - Provider registration and priority ordering
//! - Fan-out-merge and ordered-fallback fetch policies
//! - Circuit breaking for fault tolerance
//! - Payload validation

mod circuit_breaker;
mod diagnostics;
mod registry;
mod validator;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitPermit, CircuitState, CircuitStatus,
};
pub use diagnostics::{AttemptOutcome, FetchDiagnostics, ProviderAttempt, SkipReason};
pub use registry::{ProviderRegistry, RegistryConfig};
pub use validator::{
    Payload, PayloadValidator, ValidationIssue, ValidationSeverity, ValidatorConfig,
};
