use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;
use quotegate_market_data::MarketDataConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub market_data: MarketDataConfig,
}

impl Config {
    /// Read `QG_*` variables, after loading a `.env` file if there is one.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("QG_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid QG_LISTEN_ADDR")?;
        let cors_allow = lookup("QG_CORS_ALLOW_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|| vec!["*".to_string()]);
        let timeout_ms: u64 = parsed(&lookup, "QG_REQUEST_TIMEOUT_MS")?.unwrap_or(30_000);

        let mut market_data = MarketDataConfig::default();
        if let Some(raw) = lookup("QG_PROVIDER_ORDER") {
            market_data.provider_order = split_list(&raw)
                .into_iter()
                .map(|id| id.to_ascii_uppercase())
                .collect();
        }
        market_data.alpha_vantage_api_key = secret(&lookup, "QG_ALPHA_VANTAGE_API_KEY");
        market_data.polygon_api_key = secret(&lookup, "QG_POLYGON_API_KEY");
        if let Some(secs) = parsed(&lookup, "QG_CACHE_TTL_SECS")? {
            market_data.cache_ttl_secs = secs;
        }
        if let Some(secs) = parsed(&lookup, "QG_CACHE_SWEEP_INTERVAL_SECS")? {
            market_data.cache_sweep_interval_secs = secs;
        }
        if let Some(n) = parsed(&lookup, "QG_BATCH_CONCURRENCY")? {
            market_data.batch_concurrency = n;
        }
        if let Some(ms) = parsed(&lookup, "QG_REQUEST_DEADLINE_MS")? {
            market_data.request_deadline_ms = ms;
        }
        if let Some(ms) = parsed(&lookup, "QG_PROVIDER_TIMEOUT_MS")? {
            market_data.provider_timeout_ms = ms;
        }

        market_data
            .validate()
            .context("Invalid market data configuration")?;

        // Batches settle at their deadline; the HTTP timeout must not fire first.
        let request_timeout = Duration::from_millis(timeout_ms);
        if request_timeout <= market_data.request_deadline() {
            anyhow::bail!(
                "QG_REQUEST_TIMEOUT_MS ({} ms) must exceed QG_REQUEST_DEADLINE_MS ({} ms)",
                timeout_ms,
                market_data.request_deadline_ms
            );
        }

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout,
            market_data,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn secret<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<F, T>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(None),
    }
}
