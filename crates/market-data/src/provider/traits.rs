//! Quote provider trait definition.

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::models::{Quote, Symbol};
use crate::registry::RateLimitRule;

/// An upstream source of live quotes.
///
/// Implementations are stateless apart from their HTTP client and credentials:
/// one `fetch_quote` call is one GET request, with no internal retries. Every
/// failure is mapped into a [`ProviderError`] so the fallback chain can decide
/// what to do next.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quotegate_market_data::provider::QuoteProvider;
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl QuoteProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
///         // ... one GET, decode, map failures
///     }
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier such as "YAHOO" or "ALPHA_VANTAGE".
    ///
    /// Used as the quote source, the circuit breaker key and the rate limit key.
    fn id(&self) -> &'static str;

    /// Ordering when no explicit provider order is configured. Lower first.
    fn priority(&self) -> u8 {
        10
    }

    /// Rate-limit category consulted before each call.
    fn rate_limit_category(&self) -> &str {
        self.id()
    }

    /// Rule applied to this provider's category when configuration has none.
    fn default_rate_limit(&self) -> RateLimitRule {
        RateLimitRule::per_minute(60)
    }

    /// Fetch the current quote for `symbol`.
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError>;
}
