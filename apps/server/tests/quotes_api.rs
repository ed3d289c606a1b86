use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::Utc;
use quotegate_market_data::{
    ProviderError, Quote, QuoteProvider, QuoteService, Symbol, SystemClock,
};
use quotegate_server::{api::app_router, config::Config, AppState};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

/// Knows AAPL only.
struct AaplOnlyProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl QuoteProvider for AaplOnlyProvider {
    fn id(&self) -> &'static str {
        "FAKE"
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if symbol.as_str() != "AAPL" {
            return Err(ProviderError::not_found("FAKE", symbol.as_str(), "Unknown symbol"));
        }
        Quote::new(
            symbol.clone(),
            dec!(190.50),
            dec!(1.50),
            dec!(0.79),
            "FAKE",
            Utc::now(),
        )
        .map_err(|e| ProviderError::invalid_response("FAKE", symbol.as_str(), e.to_string()))
    }
}

fn router_for(
    mut config: Config,
    provider: Arc<dyn QuoteProvider>,
) -> axum::Router {
    config.market_data.provider_order = Vec::new();
    let service =
        QuoteService::from_parts(&config.market_data, vec![provider], Arc::new(SystemClock))
            .unwrap();
    let state = AppState::new(Arc::new(service));
    app_router(state, &config)
}

fn build_test_router() -> (axum::Router, Arc<AaplOnlyProvider>) {
    let config = Config::from_lookup(|_| None).unwrap();
    let provider = Arc::new(AaplOnlyProvider {
        calls: AtomicUsize::new(0),
    });
    (router_for(config, provider.clone()), provider)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn healthz_reports_cache_size() {
    let (app, _) = build_test_router();
    let (status, body) = get_json(&app, "/api/v1/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cachedSymbols"], 0);
}

#[tokio::test]
async fn quotes_returns_one_record_per_symbol() {
    let (app, _) = build_test_router();
    let (status, body) = get_json(&app, "/api/v1/quotes?symbols=aapl,ZZZZINVALID").await;
    assert_eq!(status, StatusCode::OK);

    let quotes = body["quotes"].as_array().unwrap();
    assert_eq!(quotes.len(), 2);

    assert_eq!(quotes[0]["symbol"], "AAPL");
    assert_eq!(quotes[0]["price"].as_f64(), Some(190.5));
    assert!(quotes[0]["changePercent"].is_number());
    assert_eq!(quotes[0]["source"], "FAKE");
    assert!(quotes[0]["error"].is_null());

    assert_eq!(quotes[1]["symbol"], "ZZZZINVALID");
    assert!(quotes[1]["price"].is_null());
    assert!(quotes[1]["error"].as_str().unwrap().contains("NOT_FOUND"));

    assert_eq!(body["cachedCount"], 0);
    assert_eq!(body["freshCount"], 1);
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let (app, provider) = build_test_router();
    get_json(&app, "/api/v1/quotes?symbols=AAPL").await;
    let (status, body) = get_json(&app, "/api/v1/quotes?symbols=AAPL").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cachedCount"], 1);
    assert_eq!(body["freshCount"], 0);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let (_, health) = get_json(&app, "/api/v1/healthz").await;
    assert_eq!(health["cachedSymbols"], 1);
}

#[tokio::test]
async fn invalid_symbol_lists_are_bad_requests() {
    let (app, provider) = build_test_router();
    for uri in [
        "/api/v1/quotes",
        "/api/v1/quotes?symbols=",
        "/api/v1/quotes?symbols=%20,%20",
        "/api/v1/quotes?symbols=AAPL,DROP%20TABLE",
    ] {
        let (status, body) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["code"], 400, "{}", uri);
        assert!(body["message"].is_string(), "{}", uri);
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

/// Answers only after `delay`.
struct SlowProvider {
    delay: Duration,
}

#[async_trait]
impl QuoteProvider for SlowProvider {
    fn id(&self) -> &'static str {
        "SLOW"
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Quote::new(symbol.clone(), dec!(10), dec!(0), dec!(0), "SLOW", Utc::now())
            .map_err(|e| ProviderError::invalid_response("SLOW", symbol.as_str(), e.to_string()))
    }
}

#[tokio::test]
async fn slow_batch_settles_with_timeouts_before_http_timeout() {
    let config = Config::from_lookup(|key| match key {
        "QG_REQUEST_DEADLINE_MS" => Some("200".to_string()),
        "QG_REQUEST_TIMEOUT_MS" => Some("2000".to_string()),
        _ => None,
    })
    .unwrap();
    let app = router_for(
        config,
        Arc::new(SlowProvider {
            delay: Duration::from_millis(1500),
        }),
    );

    let (status, body) = get_json(&app, "/api/v1/quotes?symbols=AAPL").await;

    assert_eq!(status, StatusCode::OK);
    let quotes = body["quotes"].as_array().unwrap();
    assert_eq!(quotes.len(), 1);
    assert!(quotes[0]["price"].is_null());
    assert!(quotes[0]["error"].as_str().unwrap().contains("TIMEOUT"));
}
