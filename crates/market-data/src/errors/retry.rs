/// Classification for how the registry reacts to a provider error.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Record Circuit Breaker Failure? |
/// |-------|-------------------|--------------------------------|
/// | `Never` | No (terminal, only seen on aggregate errors) | No |
/// | `FailoverWithPenalty` | Yes | Yes (affects future requests) |
/// | `NextProvider` | Yes | No |
/// | `CircuitOpen` | Yes (skip this one) | No (already recorded) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal failure. Produced by the registry itself once every
    /// provider has been tried; a provider never returns it.
    Never,

    /// Failover to the next provider and record a circuit breaker penalty.
    ///
    /// Used for transport-level trouble: unreachable host, timeout, 429,
    /// 5xx. After enough penalties the circuit opens and the provider is
    /// left out of subsequent fetches until it recovers.
    FailoverWithPenalty,

    /// Try the next provider without recording any penalty.
    ///
    /// The provider answered but could not serve this request (empty
    /// payload, unparseable body, 4xx, capability missing).
    NextProvider,

    /// Circuit breaker is open for this provider.
    /// Skip this provider until the circuit closes.
    CircuitOpen,
}
