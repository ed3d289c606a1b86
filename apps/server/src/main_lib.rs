use std::sync::Arc;

use crate::config::Config;
use quotegate_market_data::QuoteService;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub quote_service: Arc<QuoteService>,
}

impl AppState {
    pub fn new(quote_service: Arc<QuoteService>) -> Arc<Self> {
        Arc::new(Self { quote_service })
    }
}

pub fn init_tracing() {
    let log_format = std::env::var("QG_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    tracing::info!("Market data configuration: {:?}", config.market_data);
    let quote_service = Arc::new(QuoteService::from_config(&config.market_data)?);
    Ok(AppState::new(quote_service))
}
