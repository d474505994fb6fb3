//! Gemini parser implementation for planchat
//!
//! Calls the generateContent endpoint with an instruction-constrained prompt
//! and turns the returned JSON into validated event drafts.

use chrono::NaiveDateTime;
use log::debug;
use lru::LruCache;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::error::ScheduleError;
use crate::event::EventDraft;
use crate::parser::traits::Parser;
use crate::parser::{
    draft_from_provider_event, extract_json_object, sanitize_user_input, ProviderEvent,
    MAX_INPUT_LEN,
};
use anyhow::Result;
use async_trait::async_trait;

const DEFAULT_MODEL: &str = "gemini-pro";

/// Gemini parser for natural language scheduling requests
pub struct GeminiParser {
    model: String,
}

impl GeminiParser {
    pub fn with_model(model: Option<String>) -> Self {
        Self { model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()) }
    }
}

#[async_trait]
impl Parser for GeminiParser {
    async fn parse_input(
        &self,
        input: &str,
        reference_now: NaiveDateTime,
    ) -> Result<Vec<EventDraft>, ScheduleError> {
        let content = fetch_completion(input, reference_now, &self.model).await?;
        debug!("Gemini returned: {}", content);
        let draft = draft_from_content(&content)?;
        Ok(vec![draft])
    }

    fn new() -> Result<Self> {
        Ok(Self::with_model(None))
    }
}

/// Cache for raw provider replies to avoid repeated API calls
static RESPONSE_CACHE: Lazy<Mutex<LruCache<String, String>>> =
    Lazy::new(|| Mutex::new(LruCache::new(NonZeroUsize::new(100).unwrap())));

fn build_prompt(input: &str, reference_now: NaiveDateTime) -> String {
    format!(
        r#"You are an assistant that extracts scheduling information from chat messages.
Current date and time: {}

Analyze the message below and respond ONLY with a JSON object, no additional
text, of the shape:
{{"event_name": "<string>", "date": "<YYYY-MM-DD>", "start_time": "<HH:MM 24-hour>", "duration_minutes": <integer>}}

Rules:
1. If no date is specified, use today's date ({})
2. Resolve relative dates ("tomorrow", weekday names) against the current date
3. Use 24-hour format (HH:MM) for start_time
4. Default duration_minutes to 60 when the message gives no duration
5. Set any field you cannot determine to null

MESSAGE: "{}""#,
        reference_now.format("%Y-%m-%d %H:%M"),
        reference_now.format("%Y-%m-%d"),
        input
    )
}

/// Fetch the raw completion text for a request, consulting the cache first.
async fn fetch_completion(
    input: &str,
    reference_now: NaiveDateTime,
    model: &str,
) -> Result<String, ScheduleError> {
    if input.is_empty() {
        return Err(ScheduleError::Extraction("empty input provided".into()));
    }
    if input.len() > MAX_INPUT_LEN {
        return Err(ScheduleError::Extraction(format!(
            "input too long (max {} characters)",
            MAX_INPUT_LEN
        )));
    }

    let sanitized_input = sanitize_user_input(input);

    // Check cache first with proper error handling
    let cached_response = {
        let mut cache = RESPONSE_CACHE
            .lock()
            .map_err(|e| ScheduleError::Upstream(format!("failed to acquire cache lock: {}", e)))?;
        cache.get(&sanitized_input).cloned()
    };

    if let Some(cached) = cached_response {
        debug!("Using cached Gemini response for: {}", sanitized_input);
        return Ok(cached);
    }

    let api_key = env::var("GEMINI_API_KEY")
        .map_err(|_| ScheduleError::Upstream("GEMINI_API_KEY environment variable not set".into()))?;

    let prompt = build_prompt(&sanitized_input, reference_now);

    debug!("Making API call to Gemini for: {}", sanitized_input);
    let client = Client::new();
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
        model, api_key
    );
    let response = client
        .post(&url)
        .json(&json!({
            "contents": [
                {
                    "parts": [{ "text": prompt }]
                }
            ],
            "generationConfig": {
                "temperature": 0.3,
                "maxOutputTokens": 150
            }
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ScheduleError::Upstream(format!("Gemini API error: {}", response.status())));
    }

    let response_json: Value = response.json().await?;
    let content = response_json["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| ScheduleError::Upstream("invalid Gemini response format".into()))?
        .trim()
        .to_string();

    // Cache the reply before returning
    if let Ok(mut cache) = RESPONSE_CACHE.lock() {
        cache.put(sanitized_input, content.clone());
    }

    Ok(content)
}

/// Parse the completion text into a draft, tolerating prose around the JSON.
fn draft_from_content(content: &str) -> Result<EventDraft, ScheduleError> {
    let json_str = extract_json_object(content)
        .ok_or_else(|| ScheduleError::Upstream("no JSON object in Gemini response".into()))?;
    let event: ProviderEvent = serde_json::from_str(json_str)
        .map_err(|e| ScheduleError::Upstream(format!("unparsable Gemini JSON: {}", e)))?;
    draft_from_provider_event(event, chrono::Duration::minutes(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_fenced_completion() {
        let content = "```json\n{\"event_name\": \"Standup\", \"date\": \"2024-01-05\", \"start_time\": \"09:30\", \"duration_minutes\": 15}\n```";
        let draft = draft_from_content(content).unwrap();
        assert_eq!(draft.title, "Standup");
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(draft.start, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(draft.end, NaiveTime::from_hms_opt(9, 45, 0).unwrap());
    }

    #[test]
    fn null_fields_are_an_upstream_error() {
        let content = r#"{"event_name": null, "date": "2024-01-05", "start_time": "09:30", "duration_minutes": 15}"#;
        assert!(matches!(draft_from_content(content), Err(ScheduleError::Upstream(_))));
    }

    #[test]
    fn prose_without_json_is_an_upstream_error() {
        assert!(matches!(
            draft_from_content("I could not find an event in that message."),
            Err(ScheduleError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn cached_reply_short_circuits_the_api() {
        let input = "standup tomorrow at 9:30 am";
        let canned = r#"{"event_name": "Standup", "date": "2024-01-02", "start_time": "09:30", "duration_minutes": 15}"#;
        RESPONSE_CACHE
            .lock()
            .unwrap()
            .put(sanitize_user_input(input), canned.to_string());

        // No API key in the environment; only the cache can satisfy this.
        std::env::remove_var("GEMINI_API_KEY");
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let content = fetch_completion(input, now, DEFAULT_MODEL).await.unwrap();
        assert_eq!(content, canned);
    }
}
