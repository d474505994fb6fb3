//! OpenAI parser implementation for planchat
//!
//! Same draft contract as the Gemini parser, over the chat/completions
//! endpoint with the JSON shape pinned in the system prompt.

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

const DEFAULT_MODEL: &str = "gpt-4";

/// OpenAI parser for natural language scheduling requests
pub struct OpenAIParser {
    model: String,
}

impl OpenAIParser {
    pub fn with_model(model: Option<String>) -> Self {
        Self { model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()) }
    }
}

#[async_trait]
impl Parser for OpenAIParser {
    async fn parse_input(
        &self,
        input: &str,
        reference_now: NaiveDateTime,
    ) -> Result<Vec<EventDraft>, ScheduleError> {
        let content = fetch_completion(input, reference_now, &self.model).await?;
        debug!("OpenAI returned: {}", content);
        let draft = draft_from_content(&content)?;
        Ok(vec![draft])
    }

    fn new() -> Result<Self> {
        Ok(Self::with_model(None))
    }
}

static RESPONSE_CACHE: Lazy<Mutex<LruCache<String, String>>> =
    Lazy::new(|| Mutex::new(LruCache::new(NonZeroUsize::new(100).unwrap())));

fn build_system_prompt(reference_now: NaiveDateTime) -> String {
    format!(
        r#"You are an assistant that extracts scheduling information from chat messages.
Current date and time: {}

Respond ONLY with a JSON object, no additional text, of the shape:
{{"event_name": "<string>", "date": "<YYYY-MM-DD>", "start_time": "<HH:MM 24-hour>", "duration_minutes": <integer>}}

Rules:
1. If no date is specified, use today's date ({})
2. Resolve relative dates ("tomorrow", weekday names) against the current date
3. Use 24-hour format (HH:MM) for start_time
4. Default duration_minutes to 60 when the message gives no duration
5. Set any field you cannot determine to null"#,
        reference_now.format("%Y-%m-%d %H:%M"),
        reference_now.format("%Y-%m-%d")
    )
}

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

    let cached_response = {
        let mut cache = RESPONSE_CACHE
            .lock()
            .map_err(|e| ScheduleError::Upstream(format!("failed to acquire cache lock: {}", e)))?;
        cache.get(&sanitized_input).cloned()
    };

    if let Some(cached) = cached_response {
        debug!("Using cached OpenAI response for: {}", sanitized_input);
        return Ok(cached);
    }

    let api_key = env::var("OPENAI_API_KEY")
        .map_err(|_| ScheduleError::Upstream("OPENAI_API_KEY environment variable not set".into()))?;

    debug!("Making API call to OpenAI for: {}", sanitized_input);
    let client = Client::new();
    let response = client
        .post("https://api.openai.com/v1/chat/completions")
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&json!({
            "model": model,
            "messages": [
                {
                    "role": "system",
                    "content": build_system_prompt(reference_now)
                },
                {
                    "role": "user",
                    "content": sanitized_input
                }
            ],
            "temperature": 0.3,
            "max_tokens": 150
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ScheduleError::Upstream(format!("OpenAI API error: {}", response.status())));
    }

    let response_json: Value = response.json().await?;
    let content = response_json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ScheduleError::Upstream("invalid OpenAI response format".into()))?
        .trim()
        .to_string();

    if let Ok(mut cache) = RESPONSE_CACHE.lock() {
        cache.put(sanitized_input, content.clone());
    }

    Ok(content)
}

fn draft_from_content(content: &str) -> Result<EventDraft, ScheduleError> {
    let json_str = extract_json_object(content)
        .ok_or_else(|| ScheduleError::Upstream("no JSON object in OpenAI response".into()))?;
    let event: ProviderEvent = serde_json::from_str(json_str)
        .map_err(|e| ScheduleError::Upstream(format!("unparsable OpenAI JSON: {}", e)))?;
    draft_from_provider_event(event, chrono::Duration::minutes(60))
}
