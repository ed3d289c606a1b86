use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::symbol::Symbol;
use crate::errors::MarketDataError;

/// Live quote for one symbol from one provider.
///
/// Immutable once built: a new fetch produces a new `Quote`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    symbol: Symbol,

    /// Last traded / current price, always positive
    price: Decimal,

    /// Absolute change versus the previous close
    change: Decimal,

    /// Percentage change versus the previous close (1.5 means 1.5%)
    change_percent: Decimal,

    /// Provider that produced the quote (YAHOO, POLYGON, ALPHA_VANTAGE, ...)
    source: String,

    /// Instant the fetch started
    timestamp: DateTime<Utc>,
}

impl Quote {
    /// Build a quote, rejecting non-positive prices.
    pub fn new(
        symbol: Symbol,
        price: Decimal,
        change: Decimal,
        change_percent: Decimal,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, MarketDataError> {
        if price <= Decimal::ZERO {
            return Err(MarketDataError::Validation(format!(
                "Price for {} must be positive, got {}",
                symbol, price
            )));
        }

        Ok(Self {
            symbol,
            price,
            change,
            change_percent,
            source: source.into(),
            timestamp,
        })
    }

    /// Build a quote from a price and the previous close, deriving change and
    /// change percent.
    pub fn from_previous_close(
        symbol: Symbol,
        price: Decimal,
        previous_close: Decimal,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, MarketDataError> {
        let change = price - previous_close;
        let change_percent = if previous_close.is_zero() {
            Decimal::ZERO
        } else {
            (change / previous_close * Decimal::ONE_HUNDRED).round_dp(4)
        };
        Self::new(symbol, price, change, change_percent, source, timestamp)
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn change(&self) -> Decimal {
        self.change
    }

    pub fn change_percent(&self) -> Decimal {
        self.change_percent
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
