//! Provider orchestration.
//!
//! This module provides everything between a symbol and the providers:
//! - Fixed-window rate limiting over a pluggable counter store
//! - Circuit breaking for providers that keep failing
//! - Sanity validation of decoded quotes
//! - The ordered fallback chain and its attempt trace

mod attempts;
mod circuit_breaker;
mod counter_store;
mod fallback;
mod rate_limiter;
mod validator;

pub use attempts::{AttemptOutcome, AttemptTrace, ProviderAttempt, SkipReason};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use counter_store::{ConsumeOutcome, CounterStore, InMemoryCounterStore, RateWindow};
pub use fallback::{sort_by_preference, FallbackChain};
pub use rate_limiter::{RateLimitDecision, RateLimitRule, RateLimiter, AI_CATEGORY, DEFAULT_CATEGORY};
pub use validator::{QuoteValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
