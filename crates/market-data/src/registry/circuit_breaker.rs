//! Per-provider circuit breaker.
//!
//! Tracks transient failures per provider so that one which keeps timing out
//! or throttling is left out of the chain for a while:
//!
//! - **Closed**: calls go through.
//! - **Open**: the provider is skipped until the cooldown elapses.
//! - **HalfOpen**: trial calls go through; enough successes close the
//!   circuit, any failure reopens it.
//!
//! State is advisory and in-memory.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::clock::{elapsed_between, Clock, SystemClock};

/// Circuit state of one provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Thresholds for opening and closing circuits.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures that open the circuit.
    pub failure_threshold: u32,
    /// Time an open circuit waits before allowing trial calls.
    pub cooldown: Duration,
    /// Successful trial calls that close a half-open circuit.
    pub half_open_successes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            half_open_successes: 2,
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    trial_successes: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl Circuit {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            trial_successes: 0,
            opened_at: None,
        }
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.trial_successes = 0;
        self.opened_at = Some(now);
    }
}

pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Whether `provider` may be called now.
    ///
    /// Moves an open circuit to half-open once its cooldown has elapsed.
    pub fn allows(&self, provider: &str) -> bool {
        let now = self.clock.now();
        let mut circuits = self.lock_circuits();
        let Some(circuit) = circuits.get_mut(provider) else {
            return true;
        };

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = match circuit.opened_at {
                    Some(at) => elapsed_between(at, now) >= self.config.cooldown,
                    None => true,
                };
                if cooled_down {
                    info!("Circuit breaker: '{}' Open -> HalfOpen", provider);
                    circuit.state = CircuitState::HalfOpen;
                    circuit.trial_successes = 0;
                }
                cooled_down
            }
        }
    }

    pub fn record_success(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        let Some(circuit) = circuits.get_mut(provider) else {
            return;
        };

        match circuit.state {
            CircuitState::Closed => circuit.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                circuit.trial_successes += 1;
                if circuit.trial_successes >= self.config.half_open_successes {
                    info!(
                        "Circuit breaker: closing '{}' after {} successful trials",
                        provider, circuit.trial_successes
                    );
                    *circuit = Circuit::closed();
                }
            }
            CircuitState::Open => {
                debug!("Circuit breaker: late success for '{}' while open", provider);
            }
        }
    }

    pub fn record_failure(&self, provider: &str) {
        let now = self.clock.now();
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::closed);
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);

        match circuit.state {
            CircuitState::Closed => {
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    info!(
                        "Circuit breaker: opening '{}' after {} consecutive failures",
                        provider, circuit.consecutive_failures
                    );
                    circuit.open(now);
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        provider, circuit.consecutive_failures, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                info!("Circuit breaker: trial failed, reopening '{}'", provider);
                circuit.open(now);
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self, provider: &str) -> CircuitState {
        self.lock_circuits()
            .get(provider)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn reset(&self, provider: &str) {
        if self.lock_circuits().remove(provider).is_some() {
            info!("Circuit breaker: reset '{}'", provider);
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn breaker(threshold: u32) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap(),
        ));
        let config = CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_secs(30),
            half_open_successes: 2,
        };
        (CircuitBreaker::with_config(config, clock.clone()), clock)
    }

    #[test]
    fn test_opens_after_threshold() {
        let (cb, _) = breaker(3);
        cb.record_failure("YAHOO");
        cb.record_failure("YAHOO");
        assert!(cb.allows("YAHOO"));

        cb.record_failure("YAHOO");
        assert_eq!(cb.state("YAHOO"), CircuitState::Open);
        assert!(!cb.allows("YAHOO"));
        assert!(cb.allows("POLYGON"));
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let (cb, _) = breaker(2);
        cb.record_failure("YAHOO");
        cb.record_success("YAHOO");
        cb.record_failure("YAHOO");
        assert_eq!(cb.state("YAHOO"), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_then_closed() {
        let (cb, clock) = breaker(1);
        cb.record_failure("YAHOO");
        assert!(!cb.allows("YAHOO"));

        clock.advance(Duration::from_secs(30));
        assert!(cb.allows("YAHOO"));
        assert_eq!(cb.state("YAHOO"), CircuitState::HalfOpen);

        cb.record_success("YAHOO");
        assert_eq!(cb.state("YAHOO"), CircuitState::HalfOpen);
        cb.record_success("YAHOO");
        assert_eq!(cb.state("YAHOO"), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (cb, clock) = breaker(1);
        cb.record_failure("YAHOO");
        clock.advance(Duration::from_secs(31));
        assert!(cb.allows("YAHOO"));

        cb.record_failure("YAHOO");
        assert_eq!(cb.state("YAHOO"), CircuitState::Open);
        assert!(!cb.allows("YAHOO"));
    }

    #[test]
    fn test_reset() {
        let (cb, _) = breaker(1);
        cb.record_failure("YAHOO");
        cb.reset("YAHOO");
        assert!(cb.allows("YAHOO"));
        assert_eq!(cb.state("YAHOO"), CircuitState::Closed);
    }
}
