//! Error types and failure classification for the market data crate.
//!
//! This module provides:
//! - [`ProviderError`]: a classified failure of one provider for one symbol
//! - [`ProviderErrorKind`]: the common taxonomy every provider maps into
//! - [`MarketDataError`]: call-level errors (validation, configuration)
//! - [`CounterStoreError`]: failures of the rate limiter's backing store
//! - [`FailureClass`]: how the fallback chain treats a provider failure

mod retry;

pub use retry::FailureClass;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Provider id used for errors that are not attributable to one provider,
/// such as a batch deadline or a chain where every provider was skipped.
pub const ANY_PROVIDER: &str = "*";

/// Common failure taxonomy for all providers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderErrorKind {
    /// The provider's request budget is exhausted (HTTP 429 or an in-body notice).
    RateLimited,
    /// The provider (or the overall batch deadline) did not answer in time.
    Timeout,
    /// Transport failure or an unexpected HTTP status.
    NetworkError,
    /// Malformed JSON, an unexpected shape, or values failing validation.
    InvalidResponse,
    /// The provider has no data for this symbol.
    NotFound,
}

impl ProviderErrorKind {
    /// Returns the failure class used by the fallback chain.
    pub fn class(self) -> FailureClass {
        match self {
            Self::RateLimited | Self::Timeout | Self::NetworkError => FailureClass::Transient,
            Self::InvalidResponse | Self::NotFound => FailureClass::SymbolSpecific,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "RATE_LIMITED",
            Self::Timeout => "TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure of one provider for one symbol.
///
/// Provider errors are recovered by the fallback chain while providers remain;
/// once the chain is exhausted one of them is recorded against the symbol.
#[derive(Error, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind} from {provider} for {symbol}: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub symbol: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            symbol: symbol.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(provider, symbol, ProviderErrorKind::RateLimited, message)
    }

    pub fn timeout(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(provider, symbol, ProviderErrorKind::Timeout, message)
    }

    pub fn network(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(provider, symbol, ProviderErrorKind::NetworkError, message)
    }

    pub fn invalid_response(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(provider, symbol, ProviderErrorKind::InvalidResponse, message)
    }

    pub fn not_found(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(provider, symbol, ProviderErrorKind::NotFound, message)
    }

    pub fn class(&self) -> FailureClass {
        self.kind.class()
    }

    /// Whether this error should replace `current` as the error surfaced when
    /// the chain is exhausted.
    ///
    /// Symbol-specific errors outrank transient ones; within the same class
    /// the later error wins.
    pub fn supersedes(&self, current: &ProviderError) -> bool {
        self.class() >= current.class()
    }
}

/// Call-level errors of the market data engine.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The request itself is unusable (empty or malformed symbol list).
    /// Rejected before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The engine was wired with an unusable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single-symbol lookup failed after the whole chain was tried.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Failures of the rate limiter's backing counter store.
#[derive(Error, Debug)]
pub enum CounterStoreError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    #[error("Counter store error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert_eq!(ProviderErrorKind::RateLimited.class(), FailureClass::Transient);
        assert_eq!(ProviderErrorKind::Timeout.class(), FailureClass::Transient);
        assert_eq!(ProviderErrorKind::NetworkError.class(), FailureClass::Transient);
    }

    #[test]
    fn test_symbol_specific_kinds() {
        assert_eq!(ProviderErrorKind::NotFound.class(), FailureClass::SymbolSpecific);
        assert_eq!(
            ProviderErrorKind::InvalidResponse.class(),
            FailureClass::SymbolSpecific
        );
    }

    #[test]
    fn test_not_found_is_not_displaced_by_timeout() {
        let not_found = ProviderError::not_found("A", "ZZZZ", "unknown symbol");
        let timeout = ProviderError::timeout("B", "ZZZZ", "no answer");

        assert!(!timeout.supersedes(&not_found));
        assert!(not_found.supersedes(&timeout));
    }

    #[test]
    fn test_later_error_of_same_class_wins() {
        let first = ProviderError::rate_limited("A", "MSFT", "429");
        let second = ProviderError::network("B", "MSFT", "connection reset");

        assert!(second.supersedes(&first));
    }

    #[test]
    fn test_error_display() {
        let error = ProviderError::not_found("YAHOO", "ZZZZ", "No data found");
        assert_eq!(
            format!("{}", error),
            "NOT_FOUND from YAHOO for ZZZZ: No data found"
        );

        let error = MarketDataError::Validation("symbol list is empty".to_string());
        assert_eq!(format!("{}", error), "Validation error: symbol list is empty");
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ProviderErrorKind::InvalidResponse).unwrap();
        assert_eq!(json, "\"INVALID_RESPONSE\"");
    }
}
