//! Wall-clock access for the engines.
//!
//! Daily-task eligibility depends on the calendar date in one fixed
//! reference timezone, so "today" is always derived from "now" through
//! the clock's UTC offset. Engines take the clock by injection; tests use
//! [`FixedClock`] to move between days deterministically.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeDelta, Utc};

/// Errors that can occur when building a clock.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The UTC offset is outside of +/- 24 hours.
    #[error("invalid UTC offset: {minutes} minutes")]
    InvalidOffset {
        /// The rejected offset.
        minutes: i32,
    },
}

/// Source of the current instant and the reference calendar day.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Offset of the reference timezone.
    fn offset(&self) -> FixedOffset;

    /// The calendar date of [`Clock::now`] in the reference timezone.
    fn today(&self) -> NaiveDate {
        self.today_at(self.now())
    }

    /// The calendar date of `instant` in the reference timezone.
    fn today_at(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }
}

fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, ClockError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(ClockError::InvalidOffset { minutes })
}

/// The system clock, read in a fixed reference timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// System clock with a reference timezone `minutes` east of UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidOffset`] if the offset is 24 hours or
    /// more in either direction.
    pub fn with_offset_minutes(minutes: i32) -> Result<Self, ClockError> {
        Ok(Self {
            offset: offset_from_minutes(minutes)?,
        })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// A manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
    offset: FixedOffset,
}

impl FixedClock {
    /// A clock frozen at `now`, in UTC.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(now.timestamp_millis()),
            offset: Utc.fix(),
        }
    }

    /// A clock frozen at `now`, with a reference timezone `minutes` east of
    /// UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidOffset`] for offsets of 24 hours or more.
    pub fn at_with_offset(now: DateTime<Utc>, minutes: i32) -> Result<Self, ClockError> {
        Ok(Self {
            millis: AtomicI64::new(now.timestamp_millis()),
            offset: offset_from_minutes(minutes)?,
        })
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        self.millis
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or_default()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Datelike;

    use super::*;

    fn instant(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn today_follows_reference_offset() {
        // 23:30 UTC is already the next day at UTC+8.
        let now = instant("2026-10-16T23:30:00Z");
        let utc = FixedClock::at(now);
        let shanghai = FixedClock::at_with_offset(now, 480).unwrap();

        assert_eq!(utc.today().day(), 16);
        assert_eq!(shanghai.today().day(), 17);
    }

    #[test]
    fn advance_crosses_midnight() {
        let clock = FixedClock::at(instant("2026-10-16T12:00:00Z"));
        let first = clock.today();
        clock.advance(TimeDelta::hours(12));
        assert_eq!(clock.today(), first.succ_opt().unwrap());
    }

    #[test]
    fn set_replaces_instant() {
        let clock = FixedClock::at(instant("2026-10-16T12:00:00Z"));
        let later = instant("2027-01-01T00:00:00Z");
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn rejects_out_of_range_offset() {
        assert!(SystemClock::with_offset_minutes(24 * 60).is_err());
        assert!(SystemClock::with_offset_minutes(-24 * 60).is_err());
        assert!(SystemClock::with_offset_minutes(-300).is_ok());
    }

    #[test]
    fn today_at_uses_reference_offset() {
        let clock = SystemClock::with_offset_minutes(480).unwrap();
        let late_utc = instant("2026-10-16T17:30:00Z");
        assert_eq!(
            clock.today_at(late_utc),
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
        );
        assert_eq!(clock.offset().local_minus_utc(), 480 * 60);
    }
}
