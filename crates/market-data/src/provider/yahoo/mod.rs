//! Yahoo Finance quote provider.
//!
//! Reads the chart endpoint with a one-day range and takes the live price
//! from its `meta` block. No API key is needed, but Yahoo throttles clients
//! without a browser-like User-Agent.

mod models;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;
use urlencoding::encode;

use super::http::{self, DEFAULT_TIMEOUT};
use crate::clock::{Clock, SystemClock};
use crate::errors::ProviderError;
use crate::models::{Quote, Symbol};
use crate::provider::QuoteProvider;
use crate::registry::RateLimitRule;

use models::YahooChartResponse;

pub const BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const PROVIDER_ID: &str = "YAHOO";

pub struct YahooProvider {
    client: Client,
    base_url: String,
    clock: Arc<dyn Clock>,
}

impl YahooProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http::build_client(timeout),
            base_url: base_url.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp fetched quotes with `clock` instead of wall time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn decode(
        symbol: &Symbol,
        body: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Quote, ProviderError> {
        let sym = symbol.as_str();
        let response: YahooChartResponse = http::decode_json(PROVIDER_ID, sym, body)?;

        if let Some(error) = response.chart.error {
            let detail = match error.description {
                Some(description) => format!("{}: {}", error.code, description),
                None => error.code.clone(),
            };
            if error.code.eq_ignore_ascii_case("Not Found") {
                return Err(ProviderError::not_found(PROVIDER_ID, sym, detail));
            }
            return Err(ProviderError::invalid_response(PROVIDER_ID, sym, detail));
        }

        let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(ProviderError::not_found(PROVIDER_ID, sym, "Empty chart result"));
        };
        let meta = result.meta;

        let Some(raw_price) = meta.regular_market_price else {
            return Err(ProviderError::invalid_response(
                PROVIDER_ID,
                sym,
                "Missing regularMarketPrice",
            ));
        };
        let price = http::decimal_from_f64(PROVIDER_ID, sym, "regularMarketPrice", raw_price)?;

        let quote = match meta.reference_close() {
            Some(raw_close) => {
                let previous_close =
                    http::decimal_from_f64(PROVIDER_ID, sym, "chartPreviousClose", raw_close)?;
                Quote::from_previous_close(symbol.clone(), price, previous_close, PROVIDER_ID, fetched_at)
            }
            None => {
                debug!("Yahoo: no previous close for {}, reporting zero change", sym);
                Quote::from_previous_close(symbol.clone(), price, price, PROVIDER_ID, fetched_at)
            }
        };
        quote.map_err(|e| ProviderError::invalid_response(PROVIDER_ID, sym, e.to_string()))
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn default_rate_limit(&self) -> RateLimitRule {
        RateLimitRule::per_minute(100)
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        let fetched_at = self.clock.now();
        let path = format!("/v8/finance/chart/{}", encode(symbol.as_str()));
        let mut url = http::endpoint(PROVIDER_ID, symbol.as_str(), &self.base_url, &path)?;
        url.query_pairs_mut()
            .append_pair("interval", "1d")
            .append_pair("range", "1d");

        let body = http::get_body(&self.client, PROVIDER_ID, symbol.as_str(), url, None).await?;
        Self::decode(symbol, &body, fetched_at)
    }
}
