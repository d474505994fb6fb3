//! Parser traits for planchat
//!
//! This module defines the core trait and factory for turning free-text
//! scheduling requests into event drafts, providing a unified interface for
//! the different AI providers.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::config::{Config, LLMProvider};
use crate::error::ScheduleError;
use crate::event::EventDraft;

/// Parser trait for all provider implementations.
///
/// `reference_now` anchors relative dates in the request ("tomorrow",
/// weekday names) so parsing stays deterministic and testable.
#[async_trait]
pub trait Parser: Send + Sync {
    /// Parse a free-text request into validated event drafts.
    async fn parse_input(
        &self,
        input: &str,
        reference_now: NaiveDateTime,
    ) -> Result<Vec<EventDraft>, ScheduleError>;

    /// Create a new instance of this parser with default settings.
    fn new() -> Result<Self>
    where
        Self: Sized;
}

/// Factory for creating the configured provider parser.
///
/// Returns `None` when no provider is configured; the caller then runs the
/// rule-based extractor directly.
pub fn create_parser(config: &Config) -> Result<Option<Box<dyn Parser + Send + Sync>>> {
    match config.language_model.provider {
        Some(LLMProvider::Gemini) => {
            log::info!("Creating Gemini parser");
            let parser =
                crate::parser::gemini::GeminiParser::with_model(config.language_model.model.clone());
            Ok(Some(Box::new(parser)))
        }
        Some(LLMProvider::OpenAI) => {
            log::info!("Creating OpenAI parser");
            let parser =
                crate::parser::openai::OpenAIParser::with_model(config.language_model.model.clone());
            Ok(Some(Box::new(parser)))
        }
        None => {
            log::info!("No language model configured, using rule-based extraction only");
            Ok(None)
        }
    }
}
