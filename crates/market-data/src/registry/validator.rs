//! Sanity checks on decoded quotes.
//!
//! A provider can answer 200 with data that decodes fine but is unusable:
//! a quote for a different ticker, a zero price, a price off by a few orders
//! of magnitude. Hard issues reject the quote (the chain moves on as for an
//! `InvalidResponse`); soft issues are logged and the quote is kept.

use log::warn;
use rust_decimal::Decimal;

use crate::errors::ProviderError;
use crate::models::{Quote, Symbol};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Reject the quote and try the next provider.
    Hard,
    /// Keep the quote, log a warning.
    Soft,
}

#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: String) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message,
        }
    }

    fn soft(message: String) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Upper bound on a plausible price.
    pub max_price: Option<Decimal>,
    /// Absolute daily move (in percent) above which a warning is logged.
    pub warn_change_percent: Option<Decimal>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_price: Some(Decimal::from(1_000_000_000i64)),
            warn_change_percent: Some(Decimal::from(50)),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// All issues found in `quote` fetched for `requested`.
    pub fn issues(&self, requested: &Symbol, quote: &Quote) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if quote.symbol() != requested {
            issues.push(ValidationIssue::hard(format!(
                "Quote is for {} but {} was requested",
                quote.symbol(),
                requested
            )));
        }

        if quote.price() <= Decimal::ZERO {
            issues.push(ValidationIssue::hard(format!(
                "Non-positive price: {}",
                quote.price()
            )));
        }

        if let Some(max) = self.config.max_price {
            if quote.price() > max {
                issues.push(ValidationIssue::hard(format!(
                    "Price {} exceeds sanity ceiling {}",
                    quote.price(),
                    max
                )));
            }
        }

        if let Some(limit) = self.config.warn_change_percent {
            if quote.change_percent().abs() > limit {
                issues.push(ValidationIssue::soft(format!(
                    "Unusual move of {}%",
                    quote.change_percent()
                )));
            }
        }

        issues
    }

    /// Accept or reject `quote`. Soft issues are logged.
    ///
    /// A rejection is an `InvalidResponse` attributed to the quote's source.
    pub fn validate(&self, requested: &Symbol, quote: &Quote) -> Result<(), ProviderError> {
        let issues = self.issues(requested, quote);

        let hard: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();
        if !hard.is_empty() {
            return Err(ProviderError::invalid_response(
                quote.source(),
                requested.as_str(),
                hard.join("; "),
            ));
        }

        for issue in issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Soft)
        {
            warn!(
                "Quote validation warning for {} from '{}': {}",
                requested,
                quote.source(),
                issue.message
            );
        }
        Ok(())
    }
}
