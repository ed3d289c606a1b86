//! Alpha Vantage quote provider.
//!
//! Uses the `GLOBAL_QUOTE` endpoint, one call per symbol. Alpha Vantage
//! reports throttling and most errors with HTTP 200 and a message field in
//! the body, so the body is classified before it is decoded.
//!
//! Note: the free tier is limited to 5 API calls per minute.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use super::http::{self, DEFAULT_TIMEOUT};
use crate::clock::{Clock, SystemClock};
use crate::errors::ProviderError;
use crate::models::{Quote, Symbol};
use crate::provider::QuoteProvider;
use crate::registry::RateLimitRule;

pub const BASE_URL: &str = "https://www.alphavantage.co";
pub const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Alpha Vantage quote provider. Requires an API key.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
    clock: Arc<dyn Clock>,
}

/// GLOBAL_QUOTE response. Only one of the fields is normally present.
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Quote fields. An unknown symbol yields an empty object.
#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

fn mentions_throttling(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("call frequency") || lower.contains("rate limit")
}

impl AlphaVantageProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Point the client at another host, such as a mock server.
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

    /// Classify the in-body signals, then turn the quote fields into a `Quote`.
    fn decode(
        symbol: &Symbol,
        body: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Quote, ProviderError> {
        let sym = symbol.as_str();
        let response: GlobalQuoteResponse = http::decode_json(PROVIDER_ID, sym, body)?;

        if let Some(msg) = response.note.as_deref() {
            if mentions_throttling(msg) {
                return Err(ProviderError::rate_limited(PROVIDER_ID, sym, msg));
            }
            warn!("Alpha Vantage note for {}: {}", sym, msg);
        }

        if let Some(msg) = response.information.as_deref() {
            if mentions_throttling(msg) {
                return Err(ProviderError::rate_limited(PROVIDER_ID, sym, msg));
            }
            return Err(ProviderError::invalid_response(PROVIDER_ID, sym, msg));
        }

        if let Some(msg) = response.error_message {
            return Err(ProviderError::not_found(PROVIDER_ID, sym, msg));
        }

        let quote = response.global_quote.unwrap_or_default();
        let Some(raw_price) = quote.price.as_deref() else {
            return Err(ProviderError::not_found(
                PROVIDER_ID,
                sym,
                "Empty Global Quote",
            ));
        };

        if let Some(returned) = quote.symbol.as_deref() {
            if !returned.eq_ignore_ascii_case(sym) {
                debug!("Alpha Vantage returned {} for {}", returned, sym);
            }
        }

        let price = http::decimal_from_str(PROVIDER_ID, sym, "05. price", raw_price)?;
        let change = match quote.change.as_deref() {
            Some(raw) => http::decimal_from_str(PROVIDER_ID, sym, "09. change", raw)?,
            None => Decimal::ZERO,
        };
        let change_percent = match quote.change_percent.as_deref() {
            Some(raw) => http::decimal_from_str(
                PROVIDER_ID,
                sym,
                "10. change percent",
                raw.trim().trim_end_matches('%'),
            )?,
            None => Decimal::ZERO,
        };

        Quote::new(
            symbol.clone(),
            price,
            change,
            change_percent,
            PROVIDER_ID,
            fetched_at,
        )
        .map_err(|e| ProviderError::invalid_response(PROVIDER_ID, sym, e.to_string()))
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        // Last resort, the free tier is tiny
        3
    }

    fn default_rate_limit(&self) -> RateLimitRule {
        RateLimitRule::per_minute(5)
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        let fetched_at = self.clock.now();
        let mut url = http::endpoint(PROVIDER_ID, symbol.as_str(), &self.base_url, "/query")?;
        url.query_pairs_mut()
            .append_pair("function", "GLOBAL_QUOTE")
            .append_pair("symbol", symbol.as_str())
            .append_pair("apikey", &self.api_key);

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::errors::ProviderErrorKind;
    use chrono::TimeZone;
    use httpmock::prelude::*;
    use rust_decimal_macros::dec;

    const IBM_BODY: &str = r#"{
        "Global Quote": {
            "01. symbol": "IBM",
            "02. open": "187.7500",
            "05. price": "189.9800",
            "08. previous close": "188.7500",
            "09. change": "1.2300",
            "10. change percent": "0.6517%"
        }
    }"#;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    fn decode(body: &str) -> Result<Quote, ProviderError> {
        AlphaVantageProvider::decode(&symbol("IBM"), body, Utc::now())
    }

    #[test]
    fn test_decode_global_quote() {
        let quote = decode(IBM_BODY).unwrap();
        assert_eq!(quote.price(), dec!(189.98));
        assert_eq!(quote.change(), dec!(1.23));
        assert_eq!(quote.change_percent(), dec!(0.6517));
        assert_eq!(quote.source(), PROVIDER_ID);
    }

    #[test]
    fn test_decode_throttling_note() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute and 500 calls per day."}"#;
        assert_eq!(decode(body).unwrap_err().kind, ProviderErrorKind::RateLimited);
    }

    #[test]
    fn test_decode_information() {
        let throttled = r#"{"Information": "We have detected your API key as demo and our standard API rate limit is 25 requests per day."}"#;
        assert_eq!(decode(throttled).unwrap_err().kind, ProviderErrorKind::RateLimited);

        let bad_key = r#"{"Information": "The **demo** API key is for demo purposes only. Please claim your free API key."}"#;
        assert_eq!(decode(bad_key).unwrap_err().kind, ProviderErrorKind::InvalidResponse);
    }

    #[test]
    fn test_decode_not_found() {
        let error = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        assert_eq!(decode(error).unwrap_err().kind, ProviderErrorKind::NotFound);

        let empty = r#"{"Global Quote": {}}"#;
        assert_eq!(decode(empty).unwrap_err().kind, ProviderErrorKind::NotFound);
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(
            decode("not json").unwrap_err().kind,
            ProviderErrorKind::InvalidResponse
        );
        let bad_price = r#"{"Global Quote": {"01. symbol": "IBM", "05. price": "N/A"}}"#;
        assert_eq!(decode(bad_price).unwrap_err().kind, ProviderErrorKind::InvalidResponse);
        let zero_price = r#"{"Global Quote": {"01. symbol": "IBM", "05. price": "0.0000"}}"#;
        assert_eq!(decode(zero_price).unwrap_err().kind, ProviderErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_fetch_quote_against_mock_server() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/query")
                .query_param("function", "GLOBAL_QUOTE")
                .query_param("symbol", "IBM")
                .query_param("apikey", "test-key");
            then.status(200)
                .header("content-type", "application/json")
                .body(IBM_BODY);
        });

        let fetched_at = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        let clock = Arc::new(ManualClock::new(fetched_at));
        let provider =
            AlphaVantageProvider::with_base_url("test-key", server.base_url(), DEFAULT_TIMEOUT)
                .with_clock(clock);
        let quote = provider.fetch_quote(&symbol("IBM")).await.unwrap();

        mock.assert();
        assert_eq!(quote.price(), dec!(189.98));
        assert_eq!(quote.timestamp(), fetched_at);
    }

    #[tokio::test]
    async fn test_fetch_quote_http_429() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/query");
            then.status(429).body("{}");
        });

        let provider =
            AlphaVantageProvider::with_base_url("test-key", server.base_url(), DEFAULT_TIMEOUT);
        let err = provider.fetch_quote(&symbol("IBM")).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimited);
        assert_eq!(err.provider, PROVIDER_ID);
        assert!(!err.message.contains("test-key"));
    }
}
