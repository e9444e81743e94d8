//! Interval and timestamp formatting.

use chrono::{Local, TimeZone};
use std::fmt;

/// Layout of begin/end timestamps in probe records: `yyyyMMddHHmmss,SSS`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S,%3f";

/// Stored units per millisecond when nothing else is configured.
pub const DEFAULT_UNIT_BASE: i64 = 1;

/// Largest unit base whose day multiplier still fits in an `i64`.
pub const MAX_UNIT_BASE: i64 = i64::MAX / 86_400_000;

/// A raw time interval with its unit base.
///
/// `unit_base` is how many stored units make up one millisecond. Probe
/// brackets store milliseconds, so the default base is `1` and
/// [`Interval::in_millis`] returns the raw value unchanged. Set it to
/// `1_000_000` when feeding nanosecond counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    raw: i64,
    unit_base: i64,
}

/// An interval split into calendar-like components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Breakdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// Sub-second remainder, in milliseconds.
    pub fraction: i64,
}

impl Interval {
    /// Interval of `raw` units with the default unit base.
    pub fn new(raw: i64) -> Self {
        Self::with_unit_base(raw, DEFAULT_UNIT_BASE)
    }

    /// Interval of `raw` units where `unit_base` units make one millisecond.
    ///
    /// The base is clamped to `1..=MAX_UNIT_BASE`.
    pub fn with_unit_base(raw: i64, unit_base: i64) -> Self {
        Self {
            raw,
            unit_base: unit_base.clamp(1, MAX_UNIT_BASE),
        }
    }

    /// Interval from `start` to `end`.
    pub fn between(start: i64, end: i64) -> Self {
        Self::new(end - start)
    }

    /// Replace the unit base, keeping the raw value.
    pub fn unit_base(mut self, unit_base: i64) -> Self {
        self.unit_base = unit_base.clamp(1, MAX_UNIT_BASE);
        self
    }

    /// The raw stored value.
    pub fn raw(&self) -> i64 {
        self.raw
    }

    fn millis_mult(&self) -> i64 {
        self.unit_base
    }

    fn seconds_mult(&self) -> i64 {
        self.millis_mult() * 1000
    }

    fn minutes_mult(&self) -> i64 {
        self.seconds_mult() * 60
    }

    fn hours_mult(&self) -> i64 {
        self.minutes_mult() * 60
    }

    fn days_mult(&self) -> i64 {
        self.hours_mult() * 24
    }

    pub fn in_millis(&self) -> i64 {
        self.raw / self.millis_mult()
    }

    pub fn in_seconds(&self) -> i64 {
        self.raw / self.seconds_mult()
    }

    pub fn in_minutes(&self) -> i64 {
        self.raw / self.minutes_mult()
    }

    pub fn in_hours(&self) -> i64 {
        self.raw / self.hours_mult()
    }

    pub fn in_days(&self) -> i64 {
        self.raw / self.days_mult()
    }

    /// Split into days, hours, minutes, seconds and the millisecond fraction.
    pub fn breakdown(&self) -> Breakdown {
        let mut rest = self.raw;
        let days = rest / self.days_mult();
        rest %= self.days_mult();
        let hours = rest / self.hours_mult();
        rest %= self.hours_mult();
        let minutes = rest / self.minutes_mult();
        rest %= self.minutes_mult();
        let seconds = rest / self.seconds_mult();
        rest %= self.seconds_mult();
        Breakdown {
            days,
            hours,
            minutes,
            seconds,
            fraction: rest / self.millis_mult(),
        }
    }
}

impl From<i64> for Interval {
    fn from(raw: i64) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for Interval {
    /// `"<days> day(s) H:MM:SS.fff"`, the day prefix only when days are nonzero.
    /// The fraction is not padded.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.breakdown();
        if b.days != 0 {
            write!(f, "{} day(s) ", b.days)?;
        }
        write!(
            f,
            "{}:{:02}:{:02}.{}",
            b.hours, b.minutes, b.seconds, b.fraction
        )
    }
}

/// Format epoch milliseconds as `yyyyMMddHHmmss,SSS` in local time.
pub fn format_timestamp(millis: i64) -> String {
    format_timestamp_in(millis, &Local)
}

/// Format epoch milliseconds as `yyyyMMddHHmmss,SSS` in the given zone.
///
/// Out-of-range values format as an empty string.
pub fn format_timestamp_in<Tz>(millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    match tz.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => String::new(),
    }
}
