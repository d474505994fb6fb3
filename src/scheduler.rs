//! Request pipeline: provider parse with timeout, validation, rule-based
//! fallback, and sequential conflict resolution against the event set.

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use log::{info, warn};

use crate::config::Config;
use crate::conflict::{self, OverlapPolicy, Resolution};
use crate::error::ScheduleError;
use crate::event::{Event, EventDraft, EventSet};
use crate::parser::{self, fallback, Parser};

/// What one request did to the event set.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    /// Events inserted by this request, in submission order, minus any that a
    /// later candidate in the same batch evicted again.
    pub scheduled: Vec<Event>,
    /// Previously scheduled events evicted to make room.
    pub evicted: Vec<Event>,
    /// Candidates refused under the reject policy.
    pub rejected: Vec<Event>,
    /// True when the rule-based extractor produced the drafts.
    pub used_fallback: bool,
}

pub struct Scheduler {
    parser: Option<Box<dyn Parser + Send + Sync>>,
    default_duration: Duration,
    overlap_policy: OverlapPolicy,
    request_timeout: std::time::Duration,
}

impl Scheduler {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            parser: parser::create_parser(config)?,
            default_duration: Duration::minutes(config.default_duration_minutes()),
            overlap_policy: config.schedule.overlap_policy,
            request_timeout: std::time::Duration::from_secs(config.request_timeout_secs()),
        })
    }

    /// Build a scheduler around an explicit parser. Used by tests and by the
    /// fallback-only mode.
    pub fn with_parser(
        parser: Option<Box<dyn Parser + Send + Sync>>,
        default_duration: Duration,
        overlap_policy: OverlapPolicy,
        request_timeout: std::time::Duration,
    ) -> Self {
        Self { parser, default_duration, overlap_policy, request_timeout }
    }

    /// Process one free-text request against the event set.
    ///
    /// The set is untouched when extraction fails; a batch of candidates is
    /// applied sequentially so later candidates see earlier insertions.
    pub async fn schedule(
        &self,
        text: &str,
        reference_now: NaiveDateTime,
        events: &mut EventSet,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let (drafts, used_fallback) = self.drafts_for(text, reference_now).await?;

        let mut outcome = ScheduleOutcome { used_fallback, ..Default::default() };
        for draft in drafts {
            let candidate = Event::from_draft(draft);
            match conflict::resolve(candidate.clone(), events, self.overlap_policy) {
                resolution @ Resolution::Insert { .. } => {
                    let evicted = conflict::apply(resolution, events);
                    for event in evicted {
                        // An earlier candidate from this same batch may be
                        // among the evicted; it never counts as scheduled.
                        if let Some(pos) = outcome.scheduled.iter().position(|e| e.id == event.id) {
                            outcome.scheduled.remove(pos);
                        } else {
                            outcome.evicted.push(event);
                        }
                    }
                    info!("Scheduled '{}' on {}", candidate.title, candidate.date);
                    outcome.scheduled.push(candidate);
                }
                Resolution::Rejected { event, conflicts } => {
                    info!(
                        "Refused '{}': overlaps {} existing event(s)",
                        event.title,
                        conflicts.len()
                    );
                    outcome.rejected.push(event);
                }
            }
        }

        Ok(outcome)
    }

    /// Produce drafts for a request: the configured provider first, the
    /// rule-based extractor when the provider fails, times out, or returns
    /// nothing usable. The provider call is never retried.
    async fn drafts_for(
        &self,
        text: &str,
        reference_now: NaiveDateTime,
    ) -> Result<(Vec<EventDraft>, bool), ScheduleError> {
        if let Some(parser) = &self.parser {
            match tokio::time::timeout(self.request_timeout, parser.parse_input(text, reference_now))
                .await
            {
                Ok(Ok(drafts)) if !drafts.is_empty() => return Ok((drafts, false)),
                Ok(Ok(_)) => {
                    warn!("Provider returned no drafts, falling back to rule-based extraction");
                }
                Ok(Err(err)) if err.is_upstream() => {
                    warn!("Provider failed ({}), falling back to rule-based extraction", err);
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    warn!(
                        "Provider timed out after {:?}, falling back to rule-based extraction",
                        self.request_timeout
                    );
                }
            }
        }

        let drafts = fallback::extract(text, reference_now, self.default_duration)?;
        Ok((drafts, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;

    /// Scripted stand-in for an AI provider.
    enum ScriptedParser {
        Drafts(Vec<EventDraft>),
        Fails(String),
        Hangs,
    }

    #[async_trait]
    impl Parser for ScriptedParser {
        async fn parse_input(
            &self,
            _input: &str,
            _reference_now: NaiveDateTime,
        ) -> Result<Vec<EventDraft>, ScheduleError> {
            match self {
                ScriptedParser::Drafts(drafts) => Ok(drafts.clone()),
                ScriptedParser::Fails(reason) => Err(ScheduleError::Upstream(reason.clone())),
                ScriptedParser::Hangs => {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }

        fn new() -> Result<Self> {
            Ok(ScriptedParser::Drafts(Vec::new()))
        }
    }

    fn monday_morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn draft(title: &str, start: (u32, u32), end: (u32, u32)) -> EventDraft {
        EventDraft::new(
            title,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        )
        .unwrap()
    }

    fn scheduler_with(parser: ScriptedParser) -> Scheduler {
        Scheduler::with_parser(
            Some(Box::new(parser)),
            Duration::minutes(60),
            OverlapPolicy::Evict,
            std::time::Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn provider_drafts_are_scheduled() {
        let scheduler =
            scheduler_with(ScriptedParser::Drafts(vec![draft("Standup", (9, 30), (9, 45))]));
        let mut events = EventSet::new();

        let outcome = scheduler.schedule("standup", monday_morning(), &mut events).await.unwrap();
        assert_eq!(outcome.scheduled.len(), 1);
        assert!(!outcome.used_fallback);
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_rules() {
        let scheduler = scheduler_with(ScriptedParser::Fails("rate limited".into()));
        let mut events = EventSet::new();

        let outcome = scheduler
            .schedule("dentist tomorrow at 4:30 pm", monday_morning(), &mut events)
            .await
            .unwrap();
        assert!(outcome.used_fallback);
        assert_eq!(outcome.scheduled[0].title, "dentist");
        assert_eq!(outcome.scheduled[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[tokio::test]
    async fn provider_timeout_falls_back_to_rules() {
        let scheduler = scheduler_with(ScriptedParser::Hangs);
        let mut events = EventSet::new();

        let outcome = scheduler
            .schedule("gym at 6 pm", monday_morning(), &mut events)
            .await
            .unwrap();
        assert!(outcome.used_fallback);
        assert_eq!(outcome.scheduled[0].title, "Gym workout");
    }

    #[tokio::test]
    async fn unintelligible_request_leaves_the_set_unchanged() {
        let scheduler = scheduler_with(ScriptedParser::Fails("down".into()));
        let mut events = EventSet::new();
        events.insert(Event::from_draft(draft("Existing", (10, 0), (11, 0))));

        let err = scheduler
            .schedule("hello there", monday_morning(), &mut events)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Extraction(_)));
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn overlapping_batch_keeps_only_the_later_candidate() {
        let scheduler = scheduler_with(ScriptedParser::Drafts(vec![
            draft("First", (10, 0), (11, 0)),
            draft("Second", (10, 30), (11, 30)),
        ]));
        let mut events = EventSet::new();

        let outcome = scheduler.schedule("two things", monday_morning(), &mut events).await.unwrap();
        assert_eq!(outcome.scheduled.len(), 1);
        assert_eq!(outcome.scheduled[0].title, "Second");
        // The first candidate never survived the batch, so it is not
        // reported as an eviction of pre-existing state either.
        assert!(outcome.evicted.is_empty());
        assert_eq!(events.len(), 1);
        assert_eq!(events.iter().next().unwrap().title, "Second");
    }

    #[tokio::test]
    async fn eviction_of_existing_events_is_reported() {
        let scheduler =
            scheduler_with(ScriptedParser::Drafts(vec![draft("New plan", (10, 0), (12, 0))]));
        let mut events = EventSet::new();
        let old = Event::from_draft(draft("Old plan", (10, 30), (11, 0)));
        events.insert(old.clone());

        let outcome = scheduler.schedule("new plan", monday_morning(), &mut events).await.unwrap();
        assert_eq!(outcome.evicted.len(), 1);
        assert_eq!(outcome.evicted[0].id, old.id);
        assert_eq!(events.len(), 1);
        assert_eq!(events.iter().next().unwrap().title, "New plan");
    }

    #[tokio::test]
    async fn reject_policy_reports_refusals() {
        let scheduler = Scheduler::with_parser(
            Some(Box::new(ScriptedParser::Drafts(vec![draft("Late entry", (10, 0), (11, 0))]))),
            Duration::minutes(60),
            OverlapPolicy::Reject,
            std::time::Duration::from_millis(50),
        );
        let mut events = EventSet::new();
        events.insert(Event::from_draft(draft("Original", (10, 30), (11, 30))));

        let outcome = scheduler.schedule("late entry", monday_morning(), &mut events).await.unwrap();
        assert!(outcome.scheduled.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events.iter().next().unwrap().title, "Original");
    }
}
