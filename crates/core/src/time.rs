use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// A simple clock abstraction so session timing stays deterministic in tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

//
// ─── CMI TIMESPAN ──────────────────────────────────────────────────────────────
//

/// Timespan written when no session start was recorded.
pub const ZERO_TIMESPAN: &str = "0000:00:00.00";

// Upper bound for the seconds part, well inside what `Duration` can hold.
const MAX_TIMESPAN_MILLIS: f64 = 9.0e15;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimespanError {
    #[error("invalid CMI timespan: {0:?}")]
    Invalid(String),
}

/// Formats a duration as a CMITimespan (`HHHH:MM:SS.SS`).
///
/// The duration is rounded to the nearest whole second, so the hundredths are
/// always `00`. Negative durations clamp to zero.
#[must_use]
pub fn cmi_timespan(elapsed: Duration) -> String {
    let millis = elapsed.num_milliseconds().max(0);
    let total_secs = millis.saturating_add(500) / 1000;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{hours:04}:{mins:02}:{secs:02}.00")
}

/// Formats the wall-clock time elapsed between `start` and `now`.
///
/// Returns [`ZERO_TIMESPAN`] when the session never started.
#[must_use]
pub fn elapsed_timespan(start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match start {
        Some(start) => cmi_timespan(now - start),
        None => ZERO_TIMESPAN.to_owned(),
    }
}

/// Parses a CMITimespan (`H+:MM:SS[.ss]`) or a bare decimal number of seconds.
///
/// # Errors
///
/// Returns `TimespanError::Invalid` when the text matches neither form.
pub fn parse_cmi_timespan(raw: &str) -> Result<Duration, TimespanError> {
    let trimmed = raw.trim();
    let invalid = || TimespanError::Invalid(raw.to_owned());

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, mins, secs) = match parts.as_slice() {
        [secs] => (0_i64, 0_i64, *secs),
        [hours, mins, secs] => (
            hours.parse::<i64>().map_err(|_| invalid())?,
            mins.parse::<i64>().map_err(|_| invalid())?,
            *secs,
        ),
        _ => return Err(invalid()),
    };

    let secs: f64 = secs.parse().map_err(|_| invalid())?;
    if hours < 0 || !(0..60).contains(&mins) || !secs.is_finite() || secs < 0.0 {
        return Err(invalid());
    }
    if parts.len() == 3 && secs >= 60.0 {
        return Err(invalid());
    }

    let millis = (secs * 1000.0).round();
    if millis >= MAX_TIMESPAN_MILLIS {
        return Err(invalid());
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = millis as i64;

    Duration::try_hours(hours)
        .zip(Duration::try_minutes(mins))
        .and_then(|(h, m)| h.checked_add(&m))
        .zip(Duration::try_milliseconds(millis))
        .and_then(|(hm, ms)| hm.checked_add(&ms))
        .ok_or_else(invalid)
}
