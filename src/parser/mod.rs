/// planchat parser module
///
/// Turns free-text scheduling requests into event drafts, either through an
/// AI provider (Gemini, OpenAI) or the rule-based fallback extractor.
pub mod fallback;
pub mod gemini;
pub mod openai;
pub mod traits;

use chrono::{Duration, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub use traits::{create_parser, Parser};

use crate::error::ScheduleError;
use crate::event::EventDraft;
use crate::validation::{validate_date_format, validate_time_format};

/// Maximum accepted request length, matching the provider prompt budget.
pub const MAX_INPUT_LEN: usize = 1000;

/// Strip control characters and clamp whitespace before the text is embedded
/// in a provider prompt or used as a cache key.
pub fn sanitize_user_input(input: &str) -> String {
    let cleaned: String = input.chars().filter(|c| !c.is_control()).collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Pull the first `{...}` block out of a provider reply.
///
/// Providers are asked for bare JSON but routinely wrap it in prose or code
/// fences; everything outside the outermost braces is discarded.
pub fn extract_json_object(text: &str) -> Option<&str> {
    JSON_OBJECT_RE.find(text).map(|m| m.as_str())
}

/// The JSON shape both providers are instructed to return. Every field is
/// optional at the wire level; validation decides what is usable.
#[derive(Debug, Deserialize)]
pub struct ProviderEvent {
    pub event_name: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<i64>,
}

/// Validate provider fields and build a draft from them.
///
/// The provider is an untrusted boundary: a missing or malformed field is an
/// upstream error so the caller can fall back to rule-based extraction
/// instead of trusting a partial response.
pub fn draft_from_provider_event(
    event: ProviderEvent,
    default_duration: Duration,
) -> Result<EventDraft, ScheduleError> {
    let name = event
        .event_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ScheduleError::Upstream("provider response missing event name".into()))?;

    let date_str = event
        .date
        .as_deref()
        .filter(|d| validate_date_format(d))
        .ok_or_else(|| ScheduleError::Upstream("provider response missing or invalid date".into()))?;
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| ScheduleError::Upstream(format!("unparsable provider date: {}", e)))?;

    let time_str = event
        .start_time
        .as_deref()
        .filter(|t| validate_time_format(t))
        .ok_or_else(|| ScheduleError::Upstream("provider response missing or invalid time".into()))?;
    let start = NaiveTime::parse_from_str(time_str, "%H:%M")
        .map_err(|e| ScheduleError::Upstream(format!("unparsable provider time: {}", e)))?;

    let minutes = event.duration_minutes.unwrap_or(default_duration.num_minutes());
    if minutes < 1 {
        return Err(ScheduleError::Upstream(format!("invalid duration: {} minutes", minutes)));
    }

    let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(minutes));
    if wrapped != 0 {
        return Err(ScheduleError::Upstream("event would cross midnight".into()));
    }

    EventDraft::new(name, date, start, end)
        .ok_or_else(|| ScheduleError::Upstream("provider produced an empty time span".into()))
}
