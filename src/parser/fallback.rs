//! Rule-based fallback extraction.
//!
//! Invoked when the AI provider is unavailable or returns unusable output,
//! or when no provider is configured at all. Derives best-effort event
//! drafts from recognizable keywords in the raw text: relative day words,
//! weekday names, explicit dates, clock times, and a handful of common
//! activity phrasings.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ScheduleError;
use crate::event::EventDraft;
use crate::time_format;

struct TokenPatterns {
    today: Regex,
    tomorrow: Regex,
    next_week: Regex,
    weekday: Regex,
    month_day: Regex,
    iso_date: Regex,
    numeric_date: Regex,
    clock: Regex,
    noon: Regex,
    midnight: Regex,
    for_hours: Regex,
    lunch: Regex,
    gym: Regex,
    class: Regex,
    meeting: Regex,
}

static PATTERNS: Lazy<TokenPatterns> = Lazy::new(|| TokenPatterns {
    today: Regex::new(r"(?i)\btoday\b").unwrap(),
    tomorrow: Regex::new(r"(?i)\btomorrow\b").unwrap(),
    next_week: Regex::new(r"(?i)\bnext\s+week\b").unwrap(),
    weekday: Regex::new(
        r"(?i)\b(next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tues|tue|wed|thurs|thur|thu|fri|sat|sun)\b",
    )
    .unwrap(),
    month_day: Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\s+(\d{1,2})(?:st|nd|rd|th)?\b",
    )
    .unwrap(),
    iso_date: Regex::new(r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})\b").unwrap(),
    numeric_date: Regex::new(r"\b(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2,4}))?\b").unwrap(),
    clock: Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap(),
    noon: Regex::new(r"(?i)\bnoon\b").unwrap(),
    midnight: Regex::new(r"(?i)\bmidnight\b").unwrap(),
    for_hours: Regex::new(r"(?i)\bfor\s+(\d{1,2})\s+hours?\b").unwrap(),
    lunch: Regex::new(r"(?i)\blunch\s+with\s+(\w+).*?(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap(),
    gym: Regex::new(r"(?i)\bgym\b.*?(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap(),
    class: Regex::new(r"(?i)\bclass\s+(\w+).*?(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap(),
    meeting: Regex::new(r"(?i)\bmeet(?:ing)?\s+with\s+(\w+).*?(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b")
        .unwrap(),
});

/// Extract event drafts from raw text.
///
/// The date and duration are resolved once for the whole request; each
/// recognized activity phrase carries its own clock time. When no activity
/// phrase matches, a single generic draft is built from the first time
/// expression found. A request with no time expression at all is an
/// extraction failure — callers surface it, never drop it silently.
pub fn extract(
    text: &str,
    reference_now: NaiveDateTime,
    default_duration: Duration,
) -> Result<Vec<EventDraft>, ScheduleError> {
    debug!("Fallback extraction for: '{}'", text);

    let date = resolve_date(text, reference_now.date());
    let duration = resolve_duration(text, default_duration);

    let mut drafts = Vec::new();
    for (title, start) in activity_candidates(text) {
        drafts.push(build_draft(title, date, start, duration)?);
    }

    if drafts.is_empty() {
        let start = resolve_time(text).ok_or_else(|| {
            ScheduleError::Extraction(format!("no time expression found in '{}'", text))
        })?;
        let title = strip_schedule_tokens(text);
        drafts.push(build_draft(title, date, start, duration)?);
    }

    debug!("Fallback extraction produced {} draft(s)", drafts.len());
    Ok(drafts)
}

fn build_draft(
    title: String,
    date: NaiveDate,
    start: NaiveTime,
    duration: Duration,
) -> Result<EventDraft, ScheduleError> {
    let (end, wrapped) = start.overflowing_add_signed(duration);
    if wrapped != 0 {
        return Err(ScheduleError::Extraction(format!(
            "event starting at {} would cross midnight",
            time_format::format_12_hour(start)
        )));
    }
    EventDraft::new(title, date, start, end)
        .ok_or_else(|| ScheduleError::Extraction("empty time span".into()))
}

/// Resolve the event date from the request text, defaulting to the
/// reference date when nothing matches.
fn resolve_date(text: &str, today: NaiveDate) -> NaiveDate {
    let p = &*PATTERNS;

    if p.today.is_match(text) {
        return today;
    }
    if p.tomorrow.is_match(text) {
        return today + Duration::days(1);
    }
    if p.next_week.is_match(text) {
        return today + Duration::days(7);
    }
    if let Some(caps) = p.weekday.captures(text) {
        let is_next = caps.get(1).is_some();
        if let Some(target) = weekday_from_name(&caps[2]) {
            return today + Duration::days(days_until_weekday(today, target, is_next));
        }
    }
    if let Some(caps) = p.month_day.captures(text) {
        if let Some(date) = month_day_date(&caps[1], &caps[2], today) {
            return date;
        }
    }
    if let Some(caps) = p.iso_date.captures(text) {
        let (year, month, day) = (&caps[1], &caps[2], &caps[3]);
        if let (Ok(y), Ok(m), Ok(d)) = (year.parse(), month.parse(), day.parse()) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return date;
            }
        }
    }
    if let Some(caps) = p.numeric_date.captures(text) {
        if let Some(date) = numeric_date(&caps, today) {
            return date;
        }
    }

    today
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tues" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thurs" | "thur" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Days from `today` to the requested weekday. A bare weekday name means the
/// next occurrence strictly after today (never the same day); the "next"
/// prefix means the occurrence in the following week.
fn days_until_weekday(today: NaiveDate, target: Weekday, is_next: bool) -> i64 {
    let base = (target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    match (is_next, base) {
        (_, 0) => 7,
        (false, d) => d,
        (true, d) => d + 7,
    }
}

fn month_day_date(month_name: &str, day_str: &str, today: NaiveDate) -> Option<NaiveDate> {
    let month = match month_name.to_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    let day: u32 = day_str.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if date < today {
        // Past date rolls over to next year
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(date)
    }
}

fn numeric_date(caps: &regex::Captures, today: NaiveDate) -> Option<NaiveDate> {
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year = match caps.get(3) {
        Some(y) if y.as_str().len() == 2 => 2000 + y.as_str().parse::<i32>().ok()?,
        Some(y) => y.as_str().parse().ok()?,
        None => today.year(),
    };
    if !(1..=12).contains(&month) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Resolve the start time: explicit clock mentions take precedence, then the
/// literals "noon" and "midnight".
fn resolve_time(text: &str) -> Option<NaiveTime> {
    let p = &*PATTERNS;
    for caps in p.clock.captures_iter(text) {
        if let Some(time) = clock_time(caps.get(1), caps.get(2), caps.get(3)) {
            return Some(time);
        }
    }
    if p.noon.is_match(text) {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if p.midnight.is_match(text) {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }
    None
}

/// Assemble captured hour/minute/meridiem fragments into `H:MM AM/PM` and
/// run them through the strict normalizer.
fn clock_time(
    hour: Option<regex::Match>,
    minute: Option<regex::Match>,
    meridiem: Option<regex::Match>,
) -> Option<NaiveTime> {
    let hour = hour?.as_str();
    let minute = minute.map_or("00", |m| m.as_str());
    let meridiem = meridiem?.as_str();
    time_format::normalize(&format!("{}:{} {}", hour, minute, meridiem)).ok()
}

fn resolve_duration(text: &str, default_duration: Duration) -> Duration {
    if let Some(caps) = PATTERNS.for_hours.captures(text) {
        if let Ok(hours) = caps[1].parse::<i64>() {
            if hours >= 1 {
                return Duration::hours(hours);
            }
        }
    }
    default_duration
}

/// Recognized activity phrasings, each with its own embedded clock time.
/// One request can mention several activities and yields one draft apiece.
fn activity_candidates(text: &str) -> Vec<(String, NaiveTime)> {
    let p = &*PATTERNS;
    let mut candidates = Vec::new();

    if let Some(caps) = p.lunch.captures(text) {
        if let Some(time) = clock_time(caps.get(2), caps.get(3), caps.get(4)) {
            candidates.push((format!("Lunch with {}", &caps[1]), time));
        }
    }
    if let Some(caps) = p.gym.captures(text) {
        if let Some(time) = clock_time(caps.get(1), caps.get(2), caps.get(3)) {
            candidates.push(("Gym workout".to_string(), time));
        }
    }
    if let Some(caps) = p.class.captures(text) {
        if let Some(time) = clock_time(caps.get(2), caps.get(3), caps.get(4)) {
            candidates.push((format!("Class {}", &caps[1]), time));
        }
    }
    if let Some(caps) = p.meeting.captures(text) {
        if let Some(time) = clock_time(caps.get(2), caps.get(3), caps.get(4)) {
            candidates.push((format!("Meeting with {}", &caps[1]), time));
        }
    }

    candidates
}

static STRIP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:at\s+)?\d{1,2}(?::\d{2})?\s*(?:am|pm)\b",
        r"(?i)\b(?:at\s+)?(?:noon|midnight)\b",
        r"(?i)\bfor\s+\d{1,2}\s+hours?\b",
        r"(?i)\b(?:on\s+)?(?:today|tomorrow)\b",
        r"(?i)\bnext\s+week\b",
        r"(?i)\b(?:on\s+)?(?:next\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tues|tue|wed|thurs|thur|thu|fri|sat|sun)\b",
        r"(?i)\b(?:on\s+)?(?:january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\s+\d{1,2}(?:st|nd|rd|th)?\b",
        r"(?i)\b(?:on\s+)?\d{1,4}[/-]\d{1,2}(?:[/-]\d{1,4})?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// The generic event title is whatever remains once date, time, and duration
/// tokens are removed.
fn strip_schedule_tokens(text: &str) -> String {
    let mut cleaned = text.to_string();
    for re in STRIP_PATTERNS.iter() {
        cleaned = re.replace_all(&cleaned, " ").to_string();
    }
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_whitespace() || c == ',' || c == '.' || c == '-')
        .to_string()
}
