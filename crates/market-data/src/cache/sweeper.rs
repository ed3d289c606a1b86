use std::sync::Weak;
use std::time::Duration;

use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::QuoteCache;

/// Handle to the background sweep task. Aborts the task when shut down or dropped.
#[derive(Debug)]
pub struct CacheSweeper {
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    pub(super) fn spawn(cache: Weak<QuoteCache>, interval: Duration) -> Self {
        let period = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("Quote cache dropped, stopping sweeper");
                    break;
                };
                cache.sweep();
            }
        });

        info!("Quote cache sweeper started (every {:?})", period);
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn shutdown(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Quote cache sweeper stopped");
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Quote, Symbol};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_sweeps_periodically() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let cache = Arc::new(QuoteCache::with_idle_multiple(
            Duration::from_secs(1),
            1,
            clock.clone(),
        ));
        let quote = Quote::new(
            Symbol::parse("OLD").unwrap(),
            dec!(1),
            dec!(0),
            dec!(0),
            "A",
            start,
        )
        .unwrap();
        cache.put(quote);

        let sweeper = cache.spawn_sweeper(Duration::from_secs(5));
        assert!(sweeper.is_running());

        clock.advance(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(cache.is_empty());
        sweeper.shutdown();
    }
}
