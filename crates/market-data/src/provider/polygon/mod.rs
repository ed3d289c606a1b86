//! Polygon.io quote provider.
//!
//! Uses the previous-day aggregate (`/v2/aggs/ticker/{symbol}/prev`), the
//! endpoint available on the free plan. The quote price is the session
//! close; change and change percent are measured against the session open.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;
use urlencoding::encode;

use super::http::{self, DEFAULT_TIMEOUT};
use crate::clock::{Clock, SystemClock};
use crate::errors::ProviderError;
use crate::models::{Quote, Symbol};
use crate::provider::QuoteProvider;
use crate::registry::RateLimitRule;

pub const BASE_URL: &str = "https://api.polygon.io";
pub const PROVIDER_ID: &str = "POLYGON";

pub struct PolygonProvider {
    client: Client,
    api_key: String,
    base_url: String,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatesResponse {
    status: Option<String>,
    results_count: Option<u64>,
    #[serde(default)]
    results: Vec<Aggregate>,
    error: Option<String>,
    message: Option<String>,
}

/// One OHLC bar.
#[derive(Debug, Deserialize)]
struct Aggregate {
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "c")]
    close: f64,
}

impl PolygonProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http::build_client(timeout),
            api_key: api_key.into(),
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
        let response: AggregatesResponse = http::decode_json(PROVIDER_ID, sym, body)?;
        let detail = response
            .error
            .or(response.message)
            .unwrap_or_default();

        match response.status.as_deref() {
            Some("ERROR") => {
                if detail.to_ascii_lowercase().contains("exceeded") {
                    return Err(ProviderError::rate_limited(PROVIDER_ID, sym, detail));
                }
                return Err(ProviderError::invalid_response(PROVIDER_ID, sym, detail));
            }
            Some("NOT_AUTHORIZED") => {
                warn!("Polygon rejected the API key: {}", detail);
                return Err(ProviderError::invalid_response(
                    PROVIDER_ID,
                    sym,
                    format!("Not authorized: {}", detail),
                ));
            }
            _ => {}
        }

        let bar = match (response.results_count, response.results.first()) {
            (Some(0), _) | (_, None) => {
                return Err(ProviderError::not_found(
                    PROVIDER_ID,
                    sym,
                    "No aggregate for symbol",
                ));
            }
            (_, Some(bar)) => bar,
        };

        let close = http::decimal_from_f64(PROVIDER_ID, sym, "c", bar.close)?;
        let open = http::decimal_from_f64(PROVIDER_ID, sym, "o", bar.open)?;

        Quote::from_previous_close(symbol.clone(), close, open, PROVIDER_ID, fetched_at)
            .map_err(|e| ProviderError::invalid_response(PROVIDER_ID, sym, e.to_string()))
    }
}

#[async_trait]
impl QuoteProvider for PolygonProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn default_rate_limit(&self) -> RateLimitRule {
        RateLimitRule::per_minute(5)
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        let fetched_at = self.clock.now();
        let path = format!("/v2/aggs/ticker/{}/prev", encode(symbol.as_str()));
        let mut url = http::endpoint(PROVIDER_ID, symbol.as_str(), &self.base_url, &path)?;
        url.query_pairs_mut()
            .append_pair("adjusted", "true")
            .append_pair("apiKey", &self.api_key);

        let body = http::get_body(
            &self.client,
            PROVIDER_ID,
            symbol.as_str(),
            url,
            Some(&self.api_key),
        )
        .await?;

        Self::decode(symbol, &body, fetched_at)
    }
}
