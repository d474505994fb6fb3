//! Validation helpers for provider-supplied event fields.
//
// Provider output is untrusted: every field is checked here before an Event
// is constructed from it.

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}$").unwrap());

/// Validate a date string has format YYYY-MM-DD and names a real date.
pub fn validate_date_format(date: &str) -> bool {
    if !DATE_RE.is_match(date) {
        return false;
    }
    if let Ok(naive_date) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        let year = naive_date.year();
        return (2000..=2100).contains(&year);
    }
    false
}

/// Validate a 24-hour time string has format HH:MM.
pub fn validate_time_format(time: &str) -> bool {
    if !TIME_RE.is_match(time) {
        return false;
    }
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 2 {
        return false;
    }
    if let (Ok(hours), Ok(minutes)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
        return hours < 24 && minutes < 60;
    }
    false
}
