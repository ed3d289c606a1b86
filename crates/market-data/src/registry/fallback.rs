//! Ordered provider fallback for a single symbol.

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, info, warn};

use super::attempts::{AttemptOutcome, AttemptTrace, SkipReason};
use super::{CircuitBreaker, QuoteValidator, RateLimiter};
use crate::errors::{MarketDataError, ProviderError, ANY_PROVIDER};
use crate::models::{Quote, Symbol};
use crate::provider::QuoteProvider;

/// Ordered chain of providers tried one after another for a symbol.
///
/// For each provider, in order:
/// 1. An open circuit skips it
/// 2. A rate-limit denial skips it
/// 3. Otherwise it is called and the quote validated
/// 4. The first valid quote ends the chain
/// 5. Any failure moves on to the next provider; transient ones are also
///    recorded in the circuit breaker
///
/// When every provider failed, the surfaced error is the last one of the most
/// specific class: a `NotFound` from one provider is not hidden by a later
/// provider's timeout. When every provider was skipped, the symbol fails as
/// `RateLimited` against provider `"*"`.
pub struct FallbackChain {
    providers: Vec<Arc<dyn QuoteProvider>>,
    rate_limiter: Arc<RateLimiter>,
    circuit_breaker: Arc<CircuitBreaker>,
    validator: QuoteValidator,
}

impl FallbackChain {
    /// Build a chain trying `providers` in the given order.
    pub fn new(
        providers: Vec<Arc<dyn QuoteProvider>>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, MarketDataError> {
        if providers.is_empty() {
            return Err(MarketDataError::Config(
                "Fallback chain needs at least one provider".to_string(),
            ));
        }
        Ok(Self {
            providers,
            rate_limiter,
            circuit_breaker: Arc::new(CircuitBreaker::new()),
            validator: QuoteValidator::new(),
        })
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_validator(mut self, validator: QuoteValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Provider ids in chain order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Resolve one symbol through the chain.
    pub async fn resolve(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        let (result, trace) = self.resolve_with_trace(symbol).await;
        if result.is_err() {
            debug!("Chain exhausted for {}: {}", symbol, trace.summary());
        }
        result
    }

    /// Resolve one symbol, also returning what each provider did.
    pub async fn resolve_with_trace(
        &self,
        symbol: &Symbol,
    ) -> (Result<Quote, ProviderError>, AttemptTrace) {
        let mut trace = AttemptTrace::new();
        let mut surfaced: Option<ProviderError> = None;

        for provider in &self.providers {
            let provider_id = provider.id();

            if !self.circuit_breaker.allows(provider_id) {
                debug!("Circuit open for '{}', skipping {}", provider_id, symbol);
                trace.record(
                    Cow::Borrowed(provider_id),
                    AttemptOutcome::Skipped(SkipReason::CircuitOpen),
                );
                continue;
            }

            let decision = self
                .rate_limiter
                .check_and_consume(provider_id, provider.rate_limit_category())
                .await;
            if !decision.allowed {
                debug!("Rate limit reached for '{}', skipping {}", provider_id, symbol);
                trace.record(
                    Cow::Borrowed(provider_id),
                    AttemptOutcome::Skipped(SkipReason::RateLimited {
                        remaining: decision.remaining,
                        limit: decision.limit,
                    }),
                );
                continue;
            }

            let result = match provider.fetch_quote(symbol).await {
                Ok(quote) => self.validator.validate(symbol, &quote).map(|()| quote),
                Err(e) => Err(e),
            };

            match result {
                Ok(quote) => {
                    self.circuit_breaker.record_success(provider_id);
                    trace.record(Cow::Borrowed(provider_id), AttemptOutcome::Succeeded);
                    info!("Resolved {} from '{}'", symbol, provider_id);
                    return (Ok(quote), trace);
                }
                Err(error) => {
                    if error.class().penalizes_provider() {
                        self.circuit_breaker.record_failure(provider_id);
                        warn!("Provider '{}' failed for {}: {}", provider_id, symbol, error);
                    } else {
                        debug!("Provider '{}' has no data for {}: {}", provider_id, symbol, error);
                    }
                    trace.record(
                        Cow::Borrowed(provider_id),
                        AttemptOutcome::Failed(error.kind),
                    );

                    let replace = match &surfaced {
                        Some(current) => error.supersedes(current),
                        None => true,
                    };
                    if replace {
                        surfaced = Some(error);
                    }
                }
            }
        }

        let error = surfaced.unwrap_or_else(|| {
            ProviderError::rate_limited(
                ANY_PROVIDER,
                symbol.as_str(),
                format!("No provider available: {}", trace.summary()),
            )
        });
        (Err(error), trace)
    }
}

/// Sort providers by their position in `order`, then by priority.
///
/// Providers not named in `order` go after those that are.
pub fn sort_by_preference(providers: &mut [Arc<dyn QuoteProvider>], order: &[String]) {
    providers.sort_by_key(|p| {
        let position = order
            .iter()
            .position(|id| id.eq_ignore_ascii_case(p.id()))
            .unwrap_or(usize::MAX);
        (position, p.priority())
    });
}
