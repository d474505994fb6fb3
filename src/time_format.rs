//! Conversion between 12-hour labeled time strings and canonical clock times.
//!
//! The wire format for times is `H:MM AM/PM`; everything internal uses
//! `chrono::NaiveTime`. Pure functions, no I/O.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ScheduleError;

static TWELVE_HOUR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d{1,2}):(\d{2})\s*(AM|PM)\s*$").unwrap());

/// Convert a 12-hour hour/meridiem pair to the 24-hour hour.
fn convert_to_24_hour(hour: u32, meridiem: &str) -> u32 {
    match (hour, meridiem.to_lowercase().as_str()) {
        (12, "am") => 0,
        (h, "am") => h,
        (12, "pm") => 12,
        (h, "pm") => h + 12,
        _ => hour,
    }
}

/// Parse a `H:MM AM/PM` string into a `NaiveTime`.
///
/// The hour must be 1-12 and the minutes 00-59; a missing colon or meridiem
/// marker is rejected rather than guessed at.
pub fn normalize(raw: &str) -> Result<NaiveTime, ScheduleError> {
    let caps = TWELVE_HOUR_RE
        .captures(raw)
        .ok_or_else(|| ScheduleError::TimeFormat(raw.to_string()))?;

    let hour: u32 = caps[1]
        .parse()
        .map_err(|_| ScheduleError::TimeFormat(raw.to_string()))?;
    let minute: u32 = caps[2]
        .parse()
        .map_err(|_| ScheduleError::TimeFormat(raw.to_string()))?;

    if !(1..=12).contains(&hour) || minute > 59 {
        return Err(ScheduleError::TimeFormat(raw.to_string()));
    }

    let hour_24 = convert_to_24_hour(hour, &caps[3]);
    NaiveTime::from_hms_opt(hour_24, minute, 0)
        .ok_or_else(|| ScheduleError::TimeFormat(raw.to_string()))
}

/// Format a clock time back into the `H:MM AM/PM` wire form.
///
/// Inverse of [`normalize`]: `normalize(&format_12_hour(t)) == t` for every
/// minute of the day.
pub fn format_12_hour(time: NaiveTime) -> String {
    use chrono::Timelike;

    let (hour, meridiem) = match time.hour() {
        0 => (12, "AM"),
        h @ 1..=11 => (h, "AM"),
        12 => (12, "PM"),
        h => (h - 12, "PM"),
    };
    format!("{}:{:02} {}", hour, time.minute(), meridiem)
}
