// tests/harness/virtual_clock.rs
//
// Virtual clock and recording sleeper for testing.
// Lets tests pin "today" and observe back-off delays without waiting.

use chip_sync::client_ops::{Clock, Sleeper};
use chrono::{DateTime, Duration, Local, TimeZone};
use std::sync::{Arc, RwLock};

/// A clock that can be controlled for testing.
/// Thread-safe via Arc<RwLock<...>>.
#[derive(Clone)]
pub struct VirtualClock {
    inner: Arc<RwLock<DateTime<Local>>>,
}

impl VirtualClock {
    /// Create a virtual clock set to a specific time.
    pub fn at(time: DateTime<Local>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(time)),
        }
    }

    /// Create a virtual clock at 10:00 local time on the given day.
    pub fn on(year: i32, month: u32, day: u32) -> Self {
        let time = Local
            .with_ymd_and_hms(year, month, day, 10, 0, 0)
            .single()
            .expect("unambiguous local time");
        Self::at(time)
    }

    /// Advance time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut guard = self.inner.write().unwrap();
        *guard += duration;
    }

    /// Advance time by the given number of days.
    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Local> {
        *self.inner.read().unwrap()
    }
}

/// Sleeper that records requested delays instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: RwLock<Vec<std::time::Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<std::time::Duration> {
        self.sleeps.read().unwrap().clone()
    }

    pub fn secs(&self) -> Vec<u64> {
        self.sleeps().iter().map(|d| d.as_secs()).collect()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: std::time::Duration) {
        self.sleeps.write().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_virtual_clock_today() {
        let clock = VirtualClock::on(2025, 2, 14);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 2, 14).unwrap());
    }

    #[test]
    fn test_virtual_clock_advance_days() {
        let clock = VirtualClock::on(2025, 2, 28);
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    }

    #[test]
    fn test_virtual_clock_is_clone() {
        let clock1 = VirtualClock::on(2025, 1, 1);
        let clock2 = clock1.clone();

        // Both clones share the same internal state
        clock1.advance_days(5);
        assert_eq!(clock1.now(), clock2.now());
    }

    #[test]
    fn test_recording_sleeper() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep(std::time::Duration::from_secs(2));
        sleeper.sleep(std::time::Duration::from_secs(4));
        assert_eq!(sleeper.secs(), vec![2, 4]);
    }
}
