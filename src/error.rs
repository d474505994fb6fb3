//! Error taxonomy for the scheduling pipeline.
//!
//! Every variant is recoverable at the request boundary: an upstream failure
//! routes the request to the fallback extractor, and the two parse failures
//! surface as a "couldn't schedule that" response with the event set untouched.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A 12-hour time string did not match `H:MM AM/PM`.
    #[error("malformed time string: {0}")]
    TimeFormat(String),

    /// The fallback extractor could not locate the required fields.
    #[error("could not extract an event from the request: {0}")]
    Extraction(String),

    /// The AI provider was unreachable, rate-limited, or returned invalid JSON.
    #[error("upstream provider error: {0}")]
    Upstream(String),
}

impl ScheduleError {
    /// True for the failures the caller may answer with a fallback parse
    /// rather than an error response.
    pub fn is_upstream(&self) -> bool {
        matches!(self, ScheduleError::Upstream(_))
    }
}

impl From<reqwest::Error> for ScheduleError {
    fn from(err: reqwest::Error) -> Self {
        ScheduleError::Upstream(err.to_string())
    }
}
