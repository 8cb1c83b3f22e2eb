//! Per-endpoint circuit breaker.

use driftkit_spi::{DriftError, DriftResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Circuit breaker tuning knobs.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures in `Closed` before opening
    pub failure_threshold: u32,
    /// How long to stay `Open` before allowing probes
    pub recovery_timeout: Duration,
    /// Maximum concurrent probes while `HalfOpen`
    pub half_open_limit: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_limit: 3,
        }
    }
}

/// Breaker states. Transitions are serialized under one lock per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass; failures are counted
    Closed,
    /// Calls fail fast until the recovery timeout elapses
    Open,
    /// A bounded number of probes may pass
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { probes: u32 },
}

/// Circuit breaker guarding a single endpoint key.
pub struct CircuitBreaker {
    endpoint: String,
    config: BreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    /// Create a breaker for one endpoint.
    pub fn new(endpoint: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    /// The endpoint key this breaker guards.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current state, for observability.
    pub fn state(&self) -> BreakerState {
        match *self.state.lock() {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Ask to make a call.
    ///
    /// Fails fast with [`DriftError::CircuitOpen`] while open; admits at
    /// most `half_open_limit` concurrent probes after the recovery
    /// timeout. Admission is atomic under the state lock.
    pub fn try_acquire(&self) -> DriftResult<()> {
        let mut state = self.state.lock();
        match *state {
            State::Closed { .. } => Ok(()),
            State::Open { since } => {
                if since.elapsed() >= self.config.recovery_timeout {
                    tracing::info!(endpoint = %self.endpoint, "circuit half-open, admitting probe");
                    *state = State::HalfOpen { probes: 1 };
                    Ok(())
                } else {
                    Err(DriftError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                    })
                }
            }
            State::HalfOpen { ref mut probes } => {
                if *probes < self.config.half_open_limit {
                    *probes += 1;
                    Ok(())
                } else {
                    Err(DriftError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                    })
                }
            }
        }
    }

    /// Report a successful call.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match *state {
            State::HalfOpen { .. } => {
                tracing::info!(endpoint = %self.endpoint, "circuit closed after successful probe");
                *state = State::Closed { failures: 0 };
            }
            State::Closed { ref mut failures } => *failures = 0,
            State::Open { .. } => {}
        }
    }

    /// Report a failed call.
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match *state {
            State::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.config.failure_threshold {
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        failures = *failures,
                        "circuit opened"
                    );
                    *state = State::Open {
                        since: Instant::now(),
                    };
                }
            }
            State::HalfOpen { .. } => {
                tracing::warn!(endpoint = %self.endpoint, "probe failed, circuit re-opened");
                *state = State::Open {
                    since: Instant::now(),
                };
            }
            State::Open { .. } => {}
        }
    }
}

/// Shared breakers keyed by endpoint. State is independent across keys.
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry applying one config to every endpoint.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the breaker for an endpoint.
    pub fn breaker(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(endpoint) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write();
        Arc::clone(
            breakers
                .entry(endpoint.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(endpoint, self.config.clone()))),
        )
    }

    /// Endpoints with a breaker, for observability.
    pub fn endpoints(&self) -> Vec<String> {
        self.breakers.read().keys().cloned().collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftkit_spi::ErrorKind;

    fn quick_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_millis(50),
            half_open_limit: 2,
        }
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new("aws/us-east-1", quick_config());
        for _ in 0..3 {
            breaker.try_acquire().unwrap();
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        let err = breaker.try_acquire().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new("aws/us-east-1", quick_config());
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_probe_limit() {
        let breaker = CircuitBreaker::new("gcp/us-central1", quick_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(60));

        // Two probes admitted, third refused
        breaker.try_acquire().unwrap();
        breaker.try_acquire().unwrap();
        assert!(breaker.try_acquire().is_err());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn test_probe_success_closes() {
        let breaker = CircuitBreaker::new("azure/eastus", quick_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(60));

        breaker.try_acquire().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_probe_failure_reopens() {
        let breaker = CircuitBreaker::new("azure/eastus", quick_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(60));

        breaker.try_acquire().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.try_acquire().is_err());
    }

    #[test]
    fn test_registry_is_per_endpoint() {
        let registry = CircuitBreakerRegistry::new(quick_config());
        let a = registry.breaker("aws/us-east-1");
        let b = registry.breaker("aws/us-west-2");

        for _ in 0..3 {
            a.record_failure();
        }
        assert_eq!(a.state(), BreakerState::Open);
        assert_eq!(b.state(), BreakerState::Closed);

        // Same key returns the same breaker
        assert_eq!(registry.breaker("aws/us-east-1").state(), BreakerState::Open);
    }
}
