//! Quotegate Market Data Crate
//!
//! This crate fetches live quotes for batches of ticker symbols from several
//! unreliable, rate-limited upstream providers, keeping upstream traffic low
//! with a freshness-bounded in-memory cache.
//!
//! # Overview
//!
//! The engine supports:
//! - Multiple providers: Yahoo Finance, Polygon, Alpha Vantage
//! - Ordered fallback between providers for each symbol
//! - Fixed-window rate limiting and circuit breaking per provider
//! - Partial results: one symbol failing never fails the batch
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  QuoteService    |  (normalize, dedupe, bounded fan-out, merge)
//! +------------------+
//!     |         |
//!     v         v
//! +--------+ +------------------+
//! | Quote  | |  FallbackChain   |  (circuit check, rate limit, fetch, validate)
//! | Cache  | +------------------+
//! +--------+          |
//!                     v
//!            +------------------+
//!            |  QuoteProvider   |  (Yahoo, Polygon, Alpha Vantage)
//!            +------------------+
//!                     |
//!                     v
//!            +------------------+
//!            |  Quote / Error   |  (one per symbol in BatchResult)
//!            +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Symbol`] - Normalized ticker symbol
//! - [`Quote`] - Immutable live quote
//! - [`BatchResult`] - Per-symbol quotes and errors of one batch
//! - [`ProviderError`] - Classified failure of one provider for one symbol
//! - [`QuoteService`] - Entry point

pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod service;

// Re-export the core model types
pub use models::{BatchResult, ProviderId, Quote, Symbol};

pub use cache::{CacheSweeper, QuoteCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MarketDataConfig;
pub use errors::{FailureClass, MarketDataError, ProviderError, ProviderErrorKind, ANY_PROVIDER};
pub use service::QuoteService;

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::polygon::PolygonProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{build_providers, QuoteProvider};

// Re-export registry types
pub use registry::{
    AttemptOutcome, AttemptTrace, CircuitBreaker, CircuitState, CounterStore, FallbackChain,
    InMemoryCounterStore, QuoteValidator, RateLimitDecision, RateLimitRule, RateLimiter,
    SkipReason,
};
