//! In-memory quote cache.
//!
//! The cache is the single source of truth consulted before any network call.
//! It maps a symbol to the last known quote and answers freshness queries:
//!
//! - Staleness is computed lazily on read (`now - quote.timestamp > ttl`);
//!   stale entries stay in place and are still returned by [`QuoteCache::get`].
//! - Writes are last-write-wins by quote timestamp, compared and replaced
//!   under one write lock, so a slow response that started earlier never
//!   overwrites a newer one.
//! - [`QuoteCache::sweep`] drops entries nobody read for a long multiple of
//!   the TTL to bound memory.

mod sweeper;

pub use sweeper::CacheSweeper;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};

use crate::clock::{elapsed_between, Clock};
use crate::models::{Quote, Symbol};

/// Default freshness horizon.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default number of TTLs an entry may go unread before a sweep drops it.
pub const DEFAULT_IDLE_MULTIPLE: u32 = 10;

/// One cached quote with its bookkeeping.
#[derive(Debug)]
pub struct CacheEntry {
    quote: Quote,
    inserted_at: DateTime<Utc>,
    /// Milliseconds since the epoch of the last `get`, or of insertion.
    last_read_ms: AtomicI64,
}

impl CacheEntry {
    fn new(quote: Quote, inserted_at: DateTime<Utc>) -> Self {
        Self {
            quote,
            inserted_at,
            last_read_ms: AtomicI64::new(inserted_at.timestamp_millis()),
        }
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn inserted_at(&self) -> DateTime<Utc> {
        self.inserted_at
    }

    pub fn last_read(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_read_ms.load(Ordering::Relaxed))
            .single()
            .unwrap_or(self.inserted_at)
    }

    fn touch(&self, now: DateTime<Utc>) {
        self.last_read_ms
            .fetch_max(now.timestamp_millis(), Ordering::Relaxed);
    }
}

/// Thread-safe symbol → quote cache with a fixed TTL.
pub struct QuoteCache {
    entries: RwLock<HashMap<Symbol, CacheEntry>>,
    ttl: Duration,
    idle_multiple: u32,
    clock: Arc<dyn Clock>,
}

impl QuoteCache {
    /// Create a cache with the given TTL and the default idle multiple.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::with_idle_multiple(ttl, DEFAULT_IDLE_MULTIPLE, clock)
    }

    pub fn with_idle_multiple(ttl: Duration, idle_multiple: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            idle_multiple: idle_multiple.max(1),
            clock,
        }
    }

    /// Lock the entries for reading, recovering from poison if necessary.
    ///
    /// A poisoned lock can at worst hold a quote that is about to be replaced,
    /// which the timestamp comparison on the next write tolerates.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<Symbol, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Quote cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<Symbol, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Quote cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Last known quote for `symbol`, whatever its age.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        let now = self.clock.now();
        let entries = self.read_entries();
        entries.get(symbol).map(|entry| {
            entry.touch(now);
            entry.quote.clone()
        })
    }

    /// Quote for `symbol` if it is within the TTL.
    pub fn get_fresh(&self, symbol: &str) -> Option<Quote> {
        let now = self.clock.now();
        let entries = self.read_entries();
        let entry = entries.get(symbol)?;
        if elapsed_between(entry.quote.timestamp(), now) > self.ttl {
            return None;
        }
        entry.touch(now);
        Some(entry.quote.clone())
    }

    /// Age of the cached quote; `None` when absent (infinitely old).
    pub fn age(&self, symbol: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.read_entries()
            .get(symbol)
            .map(|entry| elapsed_between(entry.quote.timestamp(), now))
    }

    pub fn is_fresh(&self, symbol: &str) -> bool {
        self.age(symbol).is_some_and(|age| age <= self.ttl)
    }

    /// Store a quote, keeping whichever of the stored and incoming quotes is
    /// newer.
    ///
    /// Returns `false` when the incoming quote is older than the stored one
    /// and was discarded.
    pub fn put(&self, quote: Quote) -> bool {
        let now = self.clock.now();
        let mut entries = self.write_entries();

        if let Some(existing) = entries.get(quote.symbol()) {
            if quote.timestamp() < existing.quote.timestamp() {
                debug!(
                    "Quote cache: discarding {} from '{}' at {}, newer quote from '{}' at {} is stored",
                    quote.symbol(),
                    quote.source(),
                    quote.timestamp(),
                    existing.quote.source(),
                    existing.quote.timestamp()
                );
                return false;
            }
        }

        entries.insert(quote.symbol().clone(), CacheEntry::new(quote, now));
        true
    }

    /// Drop entries not read for `idle_multiple × ttl`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let max_idle = self.ttl.saturating_mul(self.idle_multiple);

        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|_, entry| elapsed_between(entry.last_read(), now) <= max_idle);
        let removed = before - entries.len();

        if removed > 0 {
            debug!(
                "Quote cache: swept {} idle entries, {} remain",
                removed,
                entries.len()
            );
        }
        removed
    }

    /// Start a background task calling [`sweep`](Self::sweep) every `interval`.
    ///
    /// The task holds a weak reference and ends once the cache is dropped.
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> CacheSweeper {
        CacheSweeper::spawn(Arc::downgrade(self), interval)
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.write_entries().clear();
    }
}
