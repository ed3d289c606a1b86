//! Quote provider abstractions and implementations.
//!
//! This module contains:
//! - The `QuoteProvider` trait that all providers implement
//! - Shared HTTP handling (timeouts, status mapping, key redaction)
//! - Concrete providers: Yahoo Finance, Polygon, Alpha Vantage
//!
//! Providers only fetch and decode. Ordering, rate limiting, circuit
//! breaking and fallback happen in the registry.

mod http;
mod traits;

pub mod alpha_vantage;
pub mod polygon;
pub mod yahoo;

use std::sync::Arc;

use log::info;

pub use alpha_vantage::{AlphaVantageProvider, PROVIDER_ID as ALPHA_VANTAGE_PROVIDER_ID};
pub use http::DEFAULT_TIMEOUT;
pub use polygon::{PolygonProvider, PROVIDER_ID as POLYGON_PROVIDER_ID};
pub use traits::QuoteProvider;
pub use yahoo::{YahooProvider, PROVIDER_ID as YAHOO_PROVIDER_ID};

use crate::clock::Clock;
use crate::config::MarketDataConfig;
use crate::registry::sort_by_preference;

/// Build the enabled providers in configured order.
///
/// Yahoo is always available; Polygon and Alpha Vantage need an API key and
/// are left out without one. Providers absent from `provider_order` are left
/// out too, unless the order is empty, in which case every enabled provider
/// is kept and sorted by priority. Fetched quotes are stamped with `clock`.
pub fn build_providers(
    config: &MarketDataConfig,
    clock: Arc<dyn Clock>,
) -> Vec<Arc<dyn QuoteProvider>> {
    let timeout = config.provider_timeout();
    let wanted = |id: &str| {
        config.provider_order.is_empty()
            || config
                .provider_order
                .iter()
                .any(|configured| configured.eq_ignore_ascii_case(id))
    };

    let mut providers: Vec<Arc<dyn QuoteProvider>> = Vec::new();

    if wanted(YAHOO_PROVIDER_ID) {
        providers.push(Arc::new(
            YahooProvider::with_base_url(yahoo::BASE_URL, timeout).with_clock(clock.clone()),
        ));
    }

    if wanted(POLYGON_PROVIDER_ID) {
        match non_blank(&config.polygon_api_key) {
            Some(key) => providers.push(Arc::new(
                PolygonProvider::with_base_url(key, polygon::BASE_URL, timeout)
                    .with_clock(clock.clone()),
            )),
            None => info!("Polygon API key not set, provider disabled"),
        }
    }

    if wanted(ALPHA_VANTAGE_PROVIDER_ID) {
        match non_blank(&config.alpha_vantage_api_key) {
            Some(key) => providers.push(Arc::new(
                AlphaVantageProvider::with_base_url(key, alpha_vantage::BASE_URL, timeout)
                    .with_clock(clock),
            )),
            None => info!("Alpha Vantage API key not set, provider disabled"),
        }
    }

    sort_by_preference(&mut providers, &config.provider_order);
    providers
}

fn non_blank(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}
