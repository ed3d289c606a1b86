//! Static settings of the engine.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::provider::{ALPHA_VANTAGE_PROVIDER_ID, POLYGON_PROVIDER_ID, YAHOO_PROVIDER_ID};
use crate::registry::{RateLimitRule, AI_CATEGORY, DEFAULT_CATEGORY};

/// Provider ids the engine knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = [YAHOO_PROVIDER_ID, POLYGON_PROVIDER_ID, ALPHA_VANTAGE_PROVIDER_ID];

/// Engine configuration.
///
/// Every field has a default, so an empty document deserializes into a
/// working Yahoo-only setup.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketDataConfig {
    /// Providers in the order the fallback chain tries them.
    pub provider_order: Vec<String>,
    /// Alpha Vantage key; the provider is left out without one.
    pub alpha_vantage_api_key: Option<String>,
    /// Polygon key; the provider is left out without one.
    pub polygon_api_key: Option<String>,
    pub cache_ttl_secs: u64,
    pub cache_sweep_interval_secs: u64,
    /// Entries unread for this many TTLs are swept.
    pub cache_sweep_idle_multiple: u32,
    /// Maximum symbols resolved concurrently in one batch.
    pub batch_concurrency: usize,
    pub request_deadline_ms: u64,
    pub provider_timeout_ms: u64,
    /// Rate-limit rules by category.
    pub rate_limits: HashMap<String, RateLimitRule>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            provider_order: KNOWN_PROVIDERS.iter().map(|id| id.to_string()).collect(),
            alpha_vantage_api_key: None,
            polygon_api_key: None,
            cache_ttl_secs: 60,
            cache_sweep_interval_secs: 300,
            cache_sweep_idle_multiple: 10,
            batch_concurrency: 10,
            request_deadline_ms: 25_000,
            provider_timeout_ms: 10_000,
            rate_limits: default_rate_limits(),
        }
    }
}

/// Built-in rules: `default` 60/min, `ai` 10/min and one rule per provider.
pub fn default_rate_limits() -> HashMap<String, RateLimitRule> {
    HashMap::from([
        (DEFAULT_CATEGORY.to_string(), RateLimitRule::per_minute(60)),
        (AI_CATEGORY.to_string(), RateLimitRule::per_minute(10)),
        (ALPHA_VANTAGE_PROVIDER_ID.to_string(), RateLimitRule::per_minute(5)),
        (POLYGON_PROVIDER_ID.to_string(), RateLimitRule::per_minute(5)),
        (YAHOO_PROVIDER_ID.to_string(), RateLimitRule::per_minute(100)),
    ])
}

impl MarketDataConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        if self.batch_concurrency == 0 {
            return Err(MarketDataError::Config(
                "batch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(MarketDataError::Config(
                "cache_ttl_secs must be positive".to_string(),
            ));
        }
        if self.request_deadline_ms == 0 || self.provider_timeout_ms == 0 {
            return Err(MarketDataError::Config(
                "request deadline and provider timeout must be positive".to_string(),
            ));
        }
        for (category, rule) in &self.rate_limits {
            if rule.limit == 0 || rule.window_secs == 0 {
                return Err(MarketDataError::Config(format!(
                    "Rate limit for '{}' must allow at least one call per non-empty window",
                    category
                )));
            }
        }
        if let Some(unknown) = self
            .provider_order
            .iter()
            .find(|id| !KNOWN_PROVIDERS.iter().any(|known| known.eq_ignore_ascii_case(id)))
        {
            return Err(MarketDataError::Config(format!(
                "Unknown provider '{}' in provider order (known: {})",
                unknown,
                KNOWN_PROVIDERS.join(", ")
            )));
        }
        Ok(())
    }
}

fn redact(key: &Option<String>) -> &'static str {
    match key {
        Some(_) => "***",
        None => "<unset>",
    }
}

impl fmt::Debug for MarketDataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketDataConfig")
            .field("provider_order", &self.provider_order)
            .field("alpha_vantage_api_key", &redact(&self.alpha_vantage_api_key))
            .field("polygon_api_key", &redact(&self.polygon_api_key))
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_sweep_interval_secs", &self.cache_sweep_interval_secs)
            .field("cache_sweep_idle_multiple", &self.cache_sweep_idle_multiple)
            .field("batch_concurrency", &self.batch_concurrency)
            .field("request_deadline_ms", &self.request_deadline_ms)
            .field("provider_timeout_ms", &self.provider_timeout_ms)
            .field("rate_limits", &self.rate_limits)
            .finish()
    }
}
