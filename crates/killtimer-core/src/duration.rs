//! Human-facing time formatting and duration parsing.
//!
//! Two display formats live here:
//!
//! - [`format_duration`] renders `M:SS` for progress lines. Spans of an hour
//!   or more keep counting minutes (`75:00`); there is no hour field.
//! - [`format_timedelta`] renders `H:MM:SS` (with a `N days, ` prefix) for the
//!   work log and stats output, and is accepted back by [`parse_duration`].

use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, TimeZone};

use crate::error::DurationParseError;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Render an instant as zero-padded 24-hour `HH:MM` in its own time zone.
pub fn format_clock_time<Tz>(instant: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    instant.format("%H:%M").to_string()
}

/// Render a span as `minutes:seconds`.
///
/// With `round_up` any sub-second remainder bumps the value to the next whole
/// second, so a "time left" display never under-reports. Without it the
/// remainder is dropped, which is what an "elapsed" display wants.
pub fn format_duration(span: Duration, round_up: bool) -> String {
    let total = whole_seconds(span, round_up);
    format!("{}:{:02}", total / SECS_PER_MINUTE, total % SECS_PER_MINUTE)
}

/// Whole seconds in `span`, truncated or rounded up.
pub fn whole_seconds(span: Duration, round_up: bool) -> u64 {
    let secs = span.as_secs();
    if round_up && span.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

/// Render a span as `H:MM:SS`, prefixed by `N day(s), ` for a day or more.
///
/// Microseconds are appended (`H:MM:SS.ffffff`) only when present.
pub fn format_timedelta(span: Duration) -> String {
    let secs = span.as_secs();
    let days = secs / SECS_PER_DAY;
    let rem = secs % SECS_PER_DAY;
    let clock = format!(
        "{}:{:02}:{:02}",
        rem / SECS_PER_HOUR,
        (rem % SECS_PER_HOUR) / SECS_PER_MINUTE,
        rem % SECS_PER_MINUTE
    );
    let micros = span.subsec_micros();
    let clock = if micros > 0 {
        format!("{clock}.{micros:06}")
    } else {
        clock
    };
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}

/// Parse a human duration expression.
///
/// Accepted forms:
///
/// - unit expressions: `"10m"`, `"1h30m"`, `"1h, 30m"`, `"1.5h"`, `"2 days"`
/// - clock forms: `"1:30:00"`, `"12:30"`, `"0:00:05.5"`
/// - the day-prefixed form written by [`format_timedelta`]: `"2 days, 1:00:00"`
/// - a bare number of seconds: `"90"`
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if text.starts_with('-') {
        return Err(DurationParseError::Negative(text.to_string()));
    }
    let text = text.strip_prefix('+').unwrap_or(text).trim_start();
    let invalid = || DurationParseError::Invalid(input.trim().to_string());

    if let Some((days, clock)) = text.split_once(',').filter(|(_, c)| c.contains(':')) {
        let days = days.trim();
        let days = days
            .strip_suffix("days")
            .or_else(|| days.strip_suffix("day"))
            .ok_or_else(invalid)?
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid())?;
        let clock = parse_clock(clock.trim()).ok_or_else(invalid)?;
        return days
            .checked_mul(SECS_PER_DAY)
            .map(Duration::from_secs)
            .and_then(|d| d.checked_add(clock))
            .ok_or_else(invalid);
    }

    if text.contains(':') {
        return parse_clock(text).ok_or_else(invalid);
    }

    if let Ok(secs) = text.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|_| invalid());
    }

    parse_units(text, input.trim())
}

/// `H:MM:SS` or `MM:SS`, seconds may carry a fraction.
fn parse_clock(text: &str) -> Option<Duration> {
    let parts: Vec<&str> = text.split(':').map(str::trim).collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, *s),
        [m, s] => (0, m.parse::<u64>().ok()?, *s),
        _ => return None,
    };
    if seconds.is_empty() || !seconds.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let seconds = Duration::try_from_secs_f64(seconds.parse::<f64>().ok()?).ok()?;
    let whole = hours
        .checked_mul(SECS_PER_HOUR)?
        .checked_add(minutes.checked_mul(SECS_PER_MINUTE)?)?;
    Duration::from_secs(whole).checked_add(seconds)
}

fn parse_units(text: &str, original: &str) -> Result<Duration, DurationParseError> {
    let invalid = || DurationParseError::Invalid(original.to_string());
    let mut total = 0.0_f64;
    let mut rest = text;

    while !rest.is_empty() {
        rest = rest.trim_start();
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(number_len);
        let amount: f64 = number.parse().map_err(|_| invalid())?;

        let tail = tail.trim_start();
        let unit_len = tail
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = unit_seconds(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            input: original.to_string(),
            unit: unit.to_string(),
        })?;

        total += amount * scale;
        rest = tail.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }

    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}

fn unit_seconds(unit: &str) -> Option<f64> {
    let secs = match unit.to_ascii_lowercase().as_str() {
        "w" | "wk" | "wks" | "week" | "weeks" => 7 * SECS_PER_DAY,
        "d" | "day" | "days" => SECS_PER_DAY,
        "h" | "hr" | "hrs" | "hour" | "hours" => SECS_PER_HOUR,
        "m" | "min" | "mins" | "minute" | "minutes" => SECS_PER_MINUTE,
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        _ => return None,
    };
    Some(secs as f64)
}
