use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use quotegate_market_data::{BatchResult, ProviderError, Quote, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub cached_symbols: usize,
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cached_symbols: state.quote_service.cache().len(),
    })
}

#[derive(Deserialize)]
struct QuotesQuery {
    symbols: Option<String>,
}

/// One requested symbol: either a quote or the error that replaced it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub symbol: String,
    pub price: Option<Decimal>,
    pub change: Option<Decimal>,
    pub change_percent: Option<Decimal>,
    pub source: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<&Quote> for QuoteRecord {
    fn from(quote: &Quote) -> Self {
        Self {
            symbol: quote.symbol().as_str().to_string(),
            price: Some(quote.price()),
            change: Some(quote.change()),
            change_percent: Some(quote.change_percent()),
            source: Some(quote.source().to_string()),
            timestamp: Some(quote.timestamp()),
            error: None,
        }
    }
}

impl QuoteRecord {
    fn failed(symbol: &Symbol, error: &ProviderError) -> Self {
        Self {
            symbol: symbol.as_str().to_string(),
            price: None,
            change: None,
            change_percent: None,
            source: None,
            timestamp: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotesResponse {
    pub quotes: Vec<QuoteRecord>,
    pub cached_count: usize,
    pub fresh_count: usize,
}

impl From<&BatchResult> for QuotesResponse {
    fn from(batch: &BatchResult) -> Self {
        let mut quotes: Vec<QuoteRecord> = batch
            .quotes()
            .values()
            .map(QuoteRecord::from)
            .chain(
                batch
                    .errors()
                    .iter()
                    .map(|(symbol, error)| QuoteRecord::failed(symbol, error)),
            )
            .collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Self {
            quotes,
            cached_count: batch.cached_count(),
            fresh_count: batch.fresh_count(),
        }
    }
}

async fn get_quotes(
    State(state): State<Arc<AppState>>,
    Query(q): Query<QuotesQuery>,
) -> ApiResult<Json<QuotesResponse>> {
    let raw = q
        .symbols
        .ok_or_else(|| ApiError::BadRequest("Missing 'symbols' query parameter".to_string()))?;
    let symbols: Vec<&str> = raw.split(',').collect();
    let batch = state.quote_service.get_batch_quotes(&symbols).await?;
    Ok(Json(QuotesResponse::from(&batch)))
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/quotes", get(get_quotes));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
