//! Batch quote aggregation.
//!
//! [`QuoteService`] is the entry point of the engine: it normalizes the
//! requested symbols, serves fresh ones from the cache, resolves the rest
//! through the fallback chain with bounded concurrency under one deadline,
//! writes results through to the cache and merges everything into a
//! [`BatchResult`].

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::cache::QuoteCache;
use crate::clock::{Clock, SystemClock};
use crate::config::MarketDataConfig;
use crate::errors::{MarketDataError, ProviderError, ANY_PROVIDER};
use crate::models::{BatchResult, Quote, Symbol};
use crate::provider::{build_providers, QuoteProvider};
use crate::registry::{
    CircuitBreaker, CircuitBreakerConfig, FallbackChain, InMemoryCounterStore, RateLimitRule,
    RateLimiter,
};

pub const DEFAULT_BATCH_CONCURRENCY: usize = 10;
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(25);

pub struct QuoteService {
    cache: Arc<QuoteCache>,
    chain: FallbackChain,
    concurrency: usize,
    deadline: Duration,
}

impl QuoteService {
    pub fn new(cache: Arc<QuoteCache>, chain: FallbackChain) -> Self {
        Self {
            cache,
            chain,
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            deadline: DEFAULT_REQUEST_DEADLINE,
        }
    }

    /// Maximum symbols resolved at the same time (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Time budget of one `get_batch_quotes` call.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Wire the engine from configuration with the built-in providers.
    pub fn from_config(config: &MarketDataConfig) -> Result<Self, MarketDataError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::from_parts(config, build_providers(config, clock.clone()), clock)
    }

    /// Wire the engine from configuration around the given providers.
    ///
    /// `providers` are tried in the order given. Categories without a
    /// configured rule get the provider's own default. `clock` drives the
    /// cache, the rate limiter and the circuit breaker.
    pub fn from_parts(
        config: &MarketDataConfig,
        providers: Vec<Arc<dyn QuoteProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MarketDataError> {
        config.validate()?;

        let mut rules: HashMap<String, RateLimitRule> = config.rate_limits.clone();
        for provider in &providers {
            rules
                .entry(provider.rate_limit_category().to_string())
                .or_insert_with(|| provider.default_rate_limit());
        }

        let rate_limiter = Arc::new(RateLimiter::new(
            Arc::new(InMemoryCounterStore::new()),
            rules,
            clock.clone(),
        ));
        let circuit_breaker = Arc::new(CircuitBreaker::with_config(
            CircuitBreakerConfig::default(),
            clock.clone(),
        ));
        let chain =
            FallbackChain::new(providers, rate_limiter)?.with_circuit_breaker(circuit_breaker);
        let cache = Arc::new(QuoteCache::with_idle_multiple(
            config.cache_ttl(),
            config.cache_sweep_idle_multiple,
            clock,
        ));

        info!(
            "Quote service ready: providers [{}], ttl {:?}, concurrency {}, deadline {:?}",
            chain.provider_ids().join(", "),
            config.cache_ttl(),
            config.batch_concurrency,
            config.request_deadline()
        );

        Ok(Self::new(cache, chain)
            .with_concurrency(config.batch_concurrency)
            .with_deadline(config.request_deadline()))
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Quotes for `symbols`, bounded by the configured deadline.
    pub async fn get_batch_quotes<S: AsRef<str>>(
        &self,
        symbols: &[S],
    ) -> Result<BatchResult, MarketDataError> {
        self.get_batch_quotes_with_deadline(symbols, Instant::now() + self.deadline)
            .await
    }

    /// Quotes for `symbols`; symbols unresolved at `deadline` fail as `Timeout`.
    ///
    /// Fails only when the symbol list itself is invalid. Every other failure
    /// is recorded per symbol in the result.
    pub async fn get_batch_quotes_with_deadline<S: AsRef<str>>(
        &self,
        symbols: &[S],
        deadline: Instant,
    ) -> Result<BatchResult, MarketDataError> {
        let symbols = normalize_symbols(symbols)?;
        let requested = symbols.len();
        let mut batch = BatchResult::new();

        let mut stale = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.cache.get_fresh(symbol.as_str()) {
                Some(quote) => batch.record_cached(symbol, quote),
                None => stale.push(symbol),
            }
        }

        if !stale.is_empty() {
            debug!(
                "Resolving {} of {} symbols through providers",
                stale.len(),
                requested
            );
            let chain = &self.chain;
            let mut resolved = stream::iter(stale)
                .map(|symbol| async move {
                    let outcome = match timeout_at(deadline, chain.resolve(&symbol)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ProviderError::timeout(
                            ANY_PROVIDER,
                            symbol.as_str(),
                            "Batch deadline exceeded",
                        )),
                    };
                    (symbol, outcome)
                })
                .buffer_unordered(self.concurrency);

            while let Some((symbol, outcome)) = resolved.next().await {
                match outcome {
                    Ok(quote) => {
                        let quote = self.write_through(quote);
                        batch.record_fresh(symbol, quote);
                    }
                    Err(error) => batch.record_error(symbol, error),
                }
            }
        }

        info!(
            "Batch of {}: {} cached, {} fetched, {} failed",
            requested,
            batch.cached_count(),
            batch.fresh_count(),
            batch.errors().len()
        );
        Ok(batch)
    }

    /// Quote for a single symbol.
    pub async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let (mut quotes, mut errors) = self.get_batch_quotes(&[symbol]).await?.into_parts();
        if let Some((_, quote)) = quotes.pop_first() {
            return Ok(quote);
        }
        match errors.pop_first() {
            Some((_, error)) => Err(error.into()),
            None => Err(MarketDataError::Validation(format!(
                "No result for symbol '{}'",
                symbol
            ))),
        }
    }

    /// Store a fetched quote. If a newer quote landed meanwhile, that one is
    /// returned instead.
    fn write_through(&self, quote: Quote) -> Quote {
        if self.cache.put(quote.clone()) {
            return quote;
        }
        self.cache.get(quote.symbol().as_str()).unwrap_or(quote)
    }
}

/// Trim, drop blanks, uppercase and deduplicate, keeping first-seen order.
///
/// Rejects the whole list if it ends up empty or any symbol is malformed.
pub fn normalize_symbols<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Symbol>, MarketDataError> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::with_capacity(raw.len());

    for entry in raw {
        let entry = entry.as_ref().trim();
        if entry.is_empty() {
            continue;
        }
        let symbol = Symbol::parse(entry)?;
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }

    if symbols.is_empty() {
        return Err(MarketDataError::Validation(
            "At least one symbol is required".to_string(),
        ));
    }
    Ok(symbols)
}
