//! Backing storage for rate-limit counters.
//!
//! The rate limiter never keeps counters itself: it asks a [`CounterStore`] to
//! atomically check and increment a fixed window. The in-memory store serves a
//! single process; a shared store (Redis, a database row) can implement the
//! same trait to coordinate several.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;

use crate::clock::elapsed_between;
use crate::errors::CounterStoreError;

/// Fixed-window counter for one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateWindow {
    /// Calls admitted in the current window.
    pub count: u32,
    /// Start of the current window.
    pub window_start: DateTime<Utc>,
}

impl RateWindow {
    fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Apply one fixed-window step: reset if the window elapsed, then admit
    /// the call if the limit is not reached.
    ///
    /// Returns whether the call was admitted.
    pub fn consume(&mut self, limit: u32, window: Duration, now: DateTime<Utc>) -> bool {
        if elapsed_between(self.window_start, now) >= window {
            *self = Self::starting_at(now);
        }
        if self.count < limit {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

/// Result of one atomic check-and-increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsumeOutcome {
    /// The window after the call.
    pub window: RateWindow,
    pub admitted: bool,
}

/// Storage for fixed-window counters.
///
/// `consume` must be atomic per key: two concurrent callers can never both
/// observe `count == limit - 1` and both be admitted.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn consume(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, CounterStoreError>;

    /// Forget the counter for `key`.
    async fn reset(&self, key: &str) -> Result<(), CounterStoreError>;
}

/// Process-local counter store.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the windows mutex, recovering from poison if necessary.
    ///
    /// Worst case after a poisoned lock is one miscounted call.
    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Counter store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Current window for `key`, if any call was made.
    pub fn window(&self, key: &str) -> Option<RateWindow> {
        self.lock_windows().get(key).copied()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn consume(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, CounterStoreError> {
        let mut windows = self.lock_windows();
        let entry = windows
            .entry(key.to_string())
            .or_insert_with(|| RateWindow::starting_at(now));
        let admitted = entry.consume(limit, window, now);

        Ok(ConsumeOutcome {
            window: *entry,
            admitted,
        })
    }

    async fn reset(&self, key: &str) -> Result<(), CounterStoreError> {
        self.lock_windows().remove(key);
        Ok(())
    }
}
