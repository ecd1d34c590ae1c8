//! Wall-clock abstraction.
//!
//! Timestamps on notifications and the sweep's due-date windows come from a
//! [`Clock`] so tests can pin "now". Waiting itself always uses tokio timers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{Error, Result};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Time remaining until `at`, zero if it already passed.
    fn until(&self, at: DateTime<Utc>) -> Duration {
        (at - self.now()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// `minutes` before `at`, or a validation error when the result is not
/// representable.
pub fn minutes_before(at: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>> {
    chrono::Duration::try_minutes(minutes)
        .and_then(|offset| at.checked_sub_signed(offset))
        .ok_or_else(|| {
            Error::validation(format!("{} minutes before {} is out of range", minutes, at))
        })
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.write() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(5));
    }

    #[test]
    fn test_minutes_before_rejects_overflow() {
        let at = Utc::now();
        assert_eq!(
            minutes_before(at, 30).unwrap(),
            at - chrono::Duration::minutes(30)
        );
        assert!(matches!(
            minutes_before(at, i64::MAX),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            minutes_before(at, i64::MIN),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_until_saturates_at_zero() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.until(start - chrono::Duration::seconds(10)), Duration::ZERO);
        assert_eq!(
            clock.until(start + chrono::Duration::seconds(10)),
            Duration::from_secs(10)
        );
    }
}
