//! Time sources.
//!
//! Cache freshness, rate-limit windows and circuit recovery all read the time
//! through [`Clock`] so tests can drive them with a [`ManualClock`].

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    fn lock_now(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(|poisoned| {
            warn!("Manual clock mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock_now();
        let advanced = chrono::Duration::from_std(by)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta));
        if let Some(advanced) = advanced {
            *now = advanced;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.lock_now() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock_now()
    }
}

/// Elapsed time from `earlier` to `later`, clamped at zero.
pub(crate) fn elapsed_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
    (later - earlier).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
        let clock = ManualClock::new(start);

        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 1, 2, 9, 31, 1).unwrap());
    }

    #[test]
    fn test_elapsed_between_clamps_negative() {
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 1, 2, 9, 29, 0).unwrap();

        assert_eq!(elapsed_between(earlier, later), Duration::from_secs(60));
        assert_eq!(elapsed_between(later, earlier), Duration::ZERO);
    }
}
