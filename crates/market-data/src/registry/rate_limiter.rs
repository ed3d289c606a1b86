//! Fixed-window rate limiter for provider calls.
//!
//! Every outbound call is checked against a rule chosen by category (one per
//! provider id, plus `default` and `ai`). Counters live in a [`CounterStore`];
//! when the store fails the limiter lets the call through and logs a warning,
//! so throttling bookkeeping can never take quotes down with it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::counter_store::{CounterStore, InMemoryCounterStore};
use crate::clock::{Clock, SystemClock};

/// Category used when a caller's category has no rule.
pub const DEFAULT_CATEGORY: &str = "default";

/// Category for AI-assisted lookups.
pub const AI_CATEGORY: &str = "ai";

/// Allowance for one category: `limit` calls per `window_secs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRule {
    pub limit: u32,
    pub window_secs: u64,
}

impl RateLimitRule {
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window_secs: 60,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Outcome of one rate-limit check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Calls left in the current window after this one.
    pub remaining: u32,
    pub limit: u32,
}

/// Rate limiter over a pluggable counter store.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    rules: HashMap<String, RateLimitRule>,
    fallback_rule: RateLimitRule,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter with the given rules.
    ///
    /// A `default` rule of 60 calls per minute is assumed when `rules` has none.
    pub fn new(
        store: Arc<dyn CounterStore>,
        rules: HashMap<String, RateLimitRule>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let fallback_rule = rules
            .get(DEFAULT_CATEGORY)
            .copied()
            .unwrap_or(RateLimitRule::per_minute(60));
        Self {
            store,
            rules,
            fallback_rule,
            clock,
        }
    }

    /// Limiter backed by a process-local store and the wall clock.
    pub fn in_memory(rules: HashMap<String, RateLimitRule>) -> Self {
        Self::new(
            Arc::new(InMemoryCounterStore::new()),
            rules,
            Arc::new(SystemClock),
        )
    }

    /// Rule applied to `category`, falling back to `default`.
    pub fn rule_for(&self, category: &str) -> RateLimitRule {
        self.rules
            .get(category)
            .copied()
            .unwrap_or(self.fallback_rule)
    }

    fn storage_key(key: &str, category: &str) -> String {
        format!("{}:{}", category, key)
    }

    /// Count one call for `key` under `category`'s rule.
    pub async fn check_and_consume(&self, key: &str, category: &str) -> RateLimitDecision {
        let rule = self.rule_for(category);
        let storage_key = Self::storage_key(key, category);

        match self
            .store
            .consume(&storage_key, rule.limit, rule.window(), self.clock.now())
            .await
        {
            Ok(outcome) => {
                let remaining = rule.limit.saturating_sub(outcome.window.count);
                if !outcome.admitted {
                    debug!(
                        "Rate limiter: denied '{}' ({} per {}s exhausted)",
                        storage_key, rule.limit, rule.window_secs
                    );
                }
                RateLimitDecision {
                    allowed: outcome.admitted,
                    remaining,
                    limit: rule.limit,
                }
            }
            Err(e) => {
                warn!(
                    "Rate limiter: counter store failed for '{}', allowing call: {}",
                    storage_key, e
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: rule.limit,
                    limit: rule.limit,
                }
            }
        }
    }

    /// Clear the counter for `key` under `category`.
    pub async fn reset(&self, key: &str, category: &str) {
        let storage_key = Self::storage_key(key, category);
        if let Err(e) = self.store.reset(&storage_key).await {
            warn!("Rate limiter: failed to reset '{}': {}", storage_key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::errors::CounterStoreError;
    use crate::registry::counter_store::ConsumeOutcome;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn consume(
            &self,
            _key: &str,
            _limit: u32,
            _window: Duration,
            _now: DateTime<Utc>,
        ) -> Result<ConsumeOutcome, CounterStoreError> {
            Err(CounterStoreError::Unavailable("connection refused".to_string()))
        }

        async fn reset(&self, _key: &str) -> Result<(), CounterStoreError> {
            Err(CounterStoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn rules() -> HashMap<String, RateLimitRule> {
        HashMap::from([
            (DEFAULT_CATEGORY.to_string(), RateLimitRule::per_minute(3)),
            ("POLYGON".to_string(), RateLimitRule::per_minute(2)),
        ])
    }

    fn limiter_with_clock() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap(),
        ));
        let limiter = RateLimiter::new(
            Arc::new(InMemoryCounterStore::new()),
            rules(),
            clock.clone(),
        );
        (limiter, clock)
    }

    #[tokio::test]
    async fn test_denies_after_limit() {
        let (limiter, _) = limiter_with_clock();

        let first = limiter.check_and_consume("POLYGON", "POLYGON").await;
        assert_eq!(
            first,
            RateLimitDecision {
                allowed: true,
                remaining: 1,
                limit: 2
            }
        );
        assert!(limiter.check_and_consume("POLYGON", "POLYGON").await.allowed);

        let denied = limiter.check_and_consume("POLYGON", "POLYGON").await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test]
    async fn test_window_elapses() {
        let (limiter, clock) = limiter_with_clock();
        for _ in 0..2 {
            limiter.check_and_consume("POLYGON", "POLYGON").await;
        }
        assert!(!limiter.check_and_consume("POLYGON", "POLYGON").await.allowed);

        clock.advance(Duration::from_secs(60));
        assert!(limiter.check_and_consume("POLYGON", "POLYGON").await.allowed);
    }

    #[tokio::test]
    async fn test_unknown_category_uses_default() {
        let (limiter, _) = limiter_with_clock();
        assert_eq!(limiter.rule_for("nonexistent"), RateLimitRule::per_minute(3));

        let decision = limiter.check_and_consume("user-1", "nonexistent").await;
        assert_eq!(decision.limit, 3);
        assert_eq!(decision.remaining, 2);
    }

    #[tokio::test]
    async fn test_keys_are_scoped_by_category() {
        let (limiter, _) = limiter_with_clock();
        for _ in 0..2 {
            limiter.check_and_consume("k", "POLYGON").await;
        }
        assert!(!limiter.check_and_consume("k", "POLYGON").await.allowed);
        assert!(limiter.check_and_consume("k", DEFAULT_CATEGORY).await.allowed);
    }

    #[tokio::test]
    async fn test_reset_restores_allowance() {
        let (limiter, _) = limiter_with_clock();
        for _ in 0..2 {
            limiter.check_and_consume("POLYGON", "POLYGON").await;
        }
        limiter.reset("POLYGON", "POLYGON").await;
        assert!(limiter.check_and_consume("POLYGON", "POLYGON").await.allowed);
    }

    #[tokio::test]
    async fn test_fails_open_when_store_errors() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore), rules(), Arc::new(SystemClock));

        for _ in 0..10 {
            let decision = limiter.check_and_consume("POLYGON", "POLYGON").await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, decision.limit);
        }
        // Reset failures are logged, not raised.
        limiter.reset("POLYGON", "POLYGON").await;
    }
}
