use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Longest ticker accepted (covers suffixed forms like `BRK-B`, `SHOP.TO`, `EURUSD=X`).
const MAX_SYMBOL_LEN: usize = 15;

/// Uppercase ticker symbol, the unit of work of a batch.
///
/// Constructed only through [`Symbol::parse`], which trims and uppercases the
/// input and rejects anything outside the ticker grammar.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Normalize and validate a raw ticker.
    ///
    /// Accepts 1 to 15 characters from `A-Z 0-9 . - ^ =` after trimming and
    /// uppercasing, with at least one letter or digit.
    pub fn parse(raw: &str) -> Result<Self, MarketDataError> {
        let normalized = raw.trim().to_ascii_uppercase();

        if normalized.is_empty() {
            return Err(MarketDataError::Validation(
                "Symbol must not be empty".to_string(),
            ));
        }

        if normalized.len() > MAX_SYMBOL_LEN {
            return Err(MarketDataError::Validation(format!(
                "Symbol '{}' exceeds {} characters",
                normalized, MAX_SYMBOL_LEN
            )));
        }

        let valid_chars = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if !valid_chars || !normalized.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(MarketDataError::Validation(format!(
                "Invalid symbol '{}'",
                raw.trim()
            )));
        }

        Ok(Self(Arc::from(normalized)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = MarketDataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0.to_string()
    }
}
