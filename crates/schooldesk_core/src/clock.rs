//! Wall-clock abstraction for time-sensitive store behavior.
//!
//! # Responsibility
//! - Provide epoch-millisecond timestamps for notification expiry.
//! - Provide the calendar date used by date-relative statistics.
//!
//! # Invariants
//! - `ManualClock` never advances on its own.

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of current time for the store subsystem.
pub trait Clock: Send + Sync {
    /// Current Unix epoch milliseconds.
    fn now_ms(&self) -> i64;
    /// Current calendar date as seen by dashboard users.
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the operating system time.
///
/// `today()` uses the local timezone because school days are local.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually driven clock for tests and replay tooling.
///
/// `today()` is the UTC date of the current instant.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    /// Starts the clock at midnight UTC of `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .map(|value| value.and_utc().timestamp_millis())
            .unwrap_or_default();
        Self::new(midnight)
    }

    pub fn set_ms(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn today(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp_millis(self.now_ms())
            .map(|value| value.date_naive())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock};
    use chrono::NaiveDate;

    #[test]
    fn manual_clock_reports_date_of_current_instant() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date");
        let clock = ManualClock::at_date(date);
        assert_eq!(clock.today(), date);

        clock.advance_ms(24 * 60 * 60 * 1000);
        assert_eq!(clock.today(), date.succ_opt().expect("valid date"));
    }

    #[test]
    fn manual_clock_can_be_set_to_an_absolute_instant() {
        let clock = ManualClock::new(0);
        clock.set_ms(1_704_067_200_000);
        assert_eq!(clock.now_ms(), 1_704_067_200_000);
        assert_eq!(
            clock.today(),
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
        );
    }
}
