//! Time source for the voting rules.
//!
//! "Today" and the daily cutoff are always evaluated in one reference
//! timezone, independent of where the caller is. The current instant is
//! supplied by an injected [`Clock`] so the cutoff boundary can be driven
//! deterministically in tests.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use std::sync::{Mutex, PoisonError};

/// Reference timezone offset: Europe/Moscow, UTC+03:00 all year round.
pub const REFERENCE_UTC_OFFSET_SECONDS: i32 = 3 * 60 * 60;

/// Hour of day (reference timezone) at which votes become immutable.
pub const VOTE_CUTOFF_HOUR: u32 = 11;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// Clock frozen at a wall-clock time in the reference timezone
    pub fn at_reference(local: NaiveDateTime) -> Self {
        Self::new(VotingWindow::default().to_utc(local))
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn set_reference(&self, local: NaiveDateTime) {
        self.set(VotingWindow::default().to_utc(local));
    }

    pub fn advance(&self, by: Duration) {
        let mut instant = self.instant.lock().unwrap_or_else(PoisonError::into_inner);
        *instant += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reference timezone plus daily cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingWindow {
    timezone: FixedOffset,
    cutoff: NaiveTime,
}

impl Default for VotingWindow {
    fn default() -> Self {
        Self {
            timezone: FixedOffset::east_opt(REFERENCE_UTC_OFFSET_SECONDS)
                .unwrap_or_else(|| Utc.fix()),
            cutoff: NaiveTime::from_hms_opt(VOTE_CUTOFF_HOUR, 0, 0).unwrap_or_default(),
        }
    }
}

impl VotingWindow {
    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    /// Wall-clock time in the reference timezone
    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.timezone)
    }

    /// Calendar day of `instant` in the reference timezone
    pub fn today(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Strictly before the cutoff; the cutoff instant itself is late.
    pub fn is_before_cutoff(&self, instant: DateTime<Utc>) -> bool {
        self.local(instant).time() < self.cutoff
    }

    /// Interpret a reference-timezone wall-clock time as an instant
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let offset = Duration::seconds(i64::from(self.timezone.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(local - offset, Utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(date: (i32, u32, u32), time: (u32, u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(time.0, time.1, time.2)
            .unwrap()
    }

    #[test]
    fn test_default_window() {
        let window = VotingWindow::default();
        assert_eq!(window.timezone().local_minus_utc(), 3 * 3600);
        assert_eq!(window.cutoff(), NaiveTime::from_hms_opt(11, 0, 0).unwrap());
    }

    #[test]
    fn test_today_uses_reference_timezone() {
        let window = VotingWindow::default();

        // 22:30 UTC on the 1st is already 01:30 on the 2nd in Moscow.
        let instant = reference((2024, 3, 2), (1, 30, 0));
        let utc = window.to_utc(instant);
        assert_eq!(utc.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(window.today(utc), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn test_cutoff_is_strict() {
        let window = VotingWindow::default();

        let before = window.to_utc(reference((2024, 3, 1), (10, 59, 59)));
        let at = window.to_utc(reference((2024, 3, 1), (11, 0, 0)));
        let after = window.to_utc(reference((2024, 3, 1), (11, 0, 1)));

        assert!(window.is_before_cutoff(before));
        assert!(!window.is_before_cutoff(at));
        assert!(!window.is_before_cutoff(after));
        assert!(!window.is_before_cutoff(at - Duration::nanoseconds(0)));
        assert!(window.is_before_cutoff(at - Duration::nanoseconds(1)));
    }

    #[test]
    fn test_fixed_clock_controls() {
        let clock = FixedClock::at_reference(reference((2024, 3, 1), (10, 0, 0)));
        let window = VotingWindow::default();

        assert!(window.is_before_cutoff(clock.now()));

        clock.advance(Duration::hours(1));
        assert!(!window.is_before_cutoff(clock.now()));

        clock.set_reference(reference((2024, 3, 2), (9, 0, 0)));
        assert_eq!(
            window.today(clock.now()),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_system_clock_is_close_to_now() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
