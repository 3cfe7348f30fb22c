//! Time-of-day source used to stamp timeline entries, plus the two display
//! formats the console uses.
//!
//! Monotonic ticking is not done here: the session controller drives its
//! one-second cadence from `tokio::time`, so virtual time in tests covers it.

use std::sync::Mutex;

use chrono::{Duration, Local, NaiveTime, Timelike};

pub trait Clock: Send + Sync {
    fn time_of_day(&self) -> NaiveTime;
}

/// Wall clock in the operator's local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveTime>,
}

impl ManualClock {
    pub fn new(start: NaiveTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn at(hour: u32, min: u32, sec: u32) -> Self {
        Self::new(NaiveTime::from_hms_opt(hour, min, sec).unwrap_or(NaiveTime::MIN))
    }

    pub fn set(&self, time: NaiveTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = time;
        }
    }

    /// Wraps at midnight; the timeline does not handle day rollover.
    pub fn advance_secs(&self, secs: i64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = guard.overflowing_add_signed(Duration::seconds(secs)).0;
        }
    }
}

impl Clock for ManualClock {
    fn time_of_day(&self) -> NaiveTime {
        self.now
            .lock()
            .map(|guard| *guard)
            .unwrap_or(NaiveTime::MIN)
    }
}

/// `HH:MM:SS`, 24h, zero padded. Sub-second precision is dropped.
pub fn format_time_of_day(time: NaiveTime) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// `m:ss` with unbounded minutes, e.g. `0:07`, `2:00`, `75:30`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_is_zero_padded() {
        let t = NaiveTime::from_hms_milli_opt(7, 4, 9, 850).unwrap();
        assert_eq!(format_time_of_day(t), "07:04:09");
    }

    #[test]
    fn elapsed_formats_minutes_and_padded_seconds() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(7), "0:07");
        assert_eq!(format_elapsed(120), "2:00");
        assert_eq!(format_elapsed(75 * 60 + 30), "75:30");
    }

    #[test]
    fn manual_clock_advances_and_wraps() {
        let clock = ManualClock::at(23, 59, 50);
        clock.advance_secs(5);
        assert_eq!(format_time_of_day(clock.time_of_day()), "23:59:55");
        clock.advance_secs(10);
        assert_eq!(format_time_of_day(clock.time_of_day()), "00:00:05");

        clock.set(NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(format_time_of_day(clock.time_of_day()), "06:30:00");
    }
}
