//! HTTP plumbing shared by the provider clients.
//!
//! Every provider does the same thing around its own decode step: one GET,
//! a bounded timeout, and a fixed mapping of transport and status failures
//! into [`ProviderErrorKind`](crate::errors::ProviderErrorKind).

use std::str::FromStr;
use std::time::Duration;

use num_traits::FromPrimitive;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::ProviderError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (compatible; quotegate/0.4)";

/// Build a client with the given timeout, falling back to reqwest's defaults
/// if the builder fails.
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Join `base` and an already-encoded `path` into a URL.
pub(crate) fn endpoint(
    provider: &str,
    symbol: &str,
    base: &str,
    path: &str,
) -> Result<Url, ProviderError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|e| {
        ProviderError::invalid_response(provider, symbol, format!("Failed to build URL: {}", e))
    })
}

/// Render `url` for logs with `secret` replaced by `***`.
pub(crate) fn redacted(url: &Url, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => url.as_str().replace(secret, "***"),
        _ => url.to_string(),
    }
}

/// Send one GET and return the body of a 2xx response.
///
/// - transport timeout → `Timeout`, other transport failures → `NetworkError`
/// - 429 → `RateLimited`, 404 → `NotFound`, other non-2xx → `NetworkError`
pub(crate) async fn get_body(
    client: &Client,
    provider: &str,
    symbol: &str,
    url: Url,
    secret: Option<&str>,
) -> Result<String, ProviderError> {
    debug!("{} request: {}", provider, redacted(&url, secret));

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| transport_error(provider, symbol, e, secret))?;

    let status = response.status();
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            return Err(ProviderError::rate_limited(provider, symbol, "HTTP 429"));
        }
        StatusCode::NOT_FOUND => {
            return Err(ProviderError::not_found(provider, symbol, "HTTP 404"));
        }
        s if !s.is_success() => {
            return Err(ProviderError::network(provider, symbol, format!("HTTP {}", s)));
        }
        _ => {}
    }

    response
        .text()
        .await
        .map_err(|e| transport_error(provider, symbol, e, secret))
}

fn transport_error(
    provider: &str,
    symbol: &str,
    error: reqwest::Error,
    secret: Option<&str>,
) -> ProviderError {
    let timed_out = error.is_timeout();
    let mut message = error.without_url().to_string();
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        message = message.replace(secret, "***");
    }
    if timed_out {
        ProviderError::timeout(provider, symbol, message)
    } else {
        ProviderError::network(provider, symbol, message)
    }
}

/// Deserialize a response body, mapping failures to `InvalidResponse`.
pub(crate) fn decode_json<T: DeserializeOwned>(
    provider: &str,
    symbol: &str,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(provider, symbol, format!("Malformed response: {}", e))
    })
}

/// Parse a decimal sent as a string, such as `"189.9800"`.
pub(crate) fn decimal_from_str(
    provider: &str,
    symbol: &str,
    field: &str,
    raw: &str,
) -> Result<Decimal, ProviderError> {
    Decimal::from_str(raw.trim()).map_err(|_| {
        ProviderError::invalid_response(
            provider,
            symbol,
            format!("Field '{}' is not a number: '{}'", field, raw),
        )
    })
}

/// Convert a JSON float, rejecting NaN and infinities.
pub(crate) fn decimal_from_f64(
    provider: &str,
    symbol: &str,
    field: &str,
    value: f64,
) -> Result<Decimal, ProviderError> {
    Decimal::from_f64(value).ok_or_else(|| {
        ProviderError::invalid_response(
            provider,
            symbol,
            format!("Field '{}' is not a finite number: {}", field, value),
        )
    })
}
