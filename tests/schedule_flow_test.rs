//! End-to-end tests over the scheduling pipeline: provider drafts, the
//! rule-based fallback, conflict eviction, and cancellation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use pretty_assertions::assert_eq;

use planchat::conflict::OverlapPolicy;
use planchat::event::{Event, EventDraft, EventSet};
use planchat::parser::Parser;
use planchat::scheduler::Scheduler;
use planchat::ScheduleError;

/// Stands in for the AI provider: either returns a canned script of drafts
/// or fails like an unreachable service.
struct ScriptedProvider {
    drafts: Option<Vec<EventDraft>>,
}

impl ScriptedProvider {
    fn returning(drafts: Vec<EventDraft>) -> Self {
        Self { drafts: Some(drafts) }
    }

    fn unreachable() -> Self {
        Self { drafts: None }
    }
}

#[async_trait]
impl Parser for ScriptedProvider {
    async fn parse_input(
        &self,
        _input: &str,
        _reference_now: NaiveDateTime,
    ) -> Result<Vec<EventDraft>, ScheduleError> {
        match &self.drafts {
            Some(drafts) => Ok(drafts.clone()),
            None => Err(ScheduleError::Upstream("service unreachable".into())),
        }
    }

    fn new() -> Result<Self> {
        Ok(Self::unreachable())
    }
}

fn scheduler(provider: ScriptedProvider, policy: OverlapPolicy) -> Scheduler {
    Scheduler::with_parser(
        Some(Box::new(provider)),
        Duration::minutes(60),
        policy,
        std::time::Duration::from_millis(100),
    )
}

/// Monday, 2024-01-01 09:00.
fn monday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
}

fn friday_draft(title: &str, start: (u32, u32), end: (u32, u32)) -> EventDraft {
    EventDraft::new(
        title,
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn provider_draft_lands_in_the_event_set() {
    let scheduler = scheduler(
        ScriptedProvider::returning(vec![friday_draft("Design review", (15, 0), (15, 45))]),
        OverlapPolicy::Evict,
    );
    let mut events = EventSet::new();

    let outcome = scheduler
        .schedule("design review Friday at 3 pm", monday_morning(), &mut events)
        .await
        .unwrap();

    assert!(!outcome.used_fallback);
    assert_eq!(outcome.scheduled.len(), 1);
    assert_eq!(events.len(), 1);
    let stored = events.iter().next().unwrap();
    assert_eq!(stored.title, "Design review");
    assert_eq!(stored.start, NaiveTime::from_hms_opt(15, 0, 0).unwrap());
}

#[tokio::test]
async fn unreachable_provider_is_covered_by_rules() {
    let scheduler = scheduler(ScriptedProvider::unreachable(), OverlapPolicy::Evict);
    let mut events = EventSet::new();

    let outcome = scheduler
        .schedule("Lunch with Sarah on Friday at noon", monday_morning(), &mut events)
        .await
        .unwrap();

    assert!(outcome.used_fallback);
    assert_eq!(outcome.scheduled.len(), 1);
    let event = &outcome.scheduled[0];
    assert_eq!(event.title, "Lunch with Sarah");
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    assert_eq!(event.start, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    assert_eq!(event.end, NaiveTime::from_hms_opt(13, 0, 0).unwrap());
}

#[tokio::test]
async fn new_event_evicts_every_overlap() {
    let scheduler = scheduler(
        ScriptedProvider::returning(vec![friday_draft("Offsite", (9, 30), (12, 0))]),
        OverlapPolicy::Evict,
    );
    let mut events = EventSet::new();
    events.insert(Event::from_draft(friday_draft("Standup", (9, 0), (9, 45))));
    events.insert(Event::from_draft(friday_draft("1:1", (10, 0), (10, 30))));
    events.insert(Event::from_draft(friday_draft("Lunch", (12, 0), (13, 0))));

    let outcome = scheduler.schedule("offsite", monday_morning(), &mut events).await.unwrap();

    // Touching endpoints at 12:00 keep Lunch alive
    assert_eq!(outcome.evicted.len(), 2);
    assert_eq!(events.len(), 2);
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert!(titles.contains(&"Offsite"));
    assert!(titles.contains(&"Lunch"));
}

#[tokio::test]
async fn batch_candidates_resolve_in_submission_order() {
    let scheduler = scheduler(
        ScriptedProvider::returning(vec![
            friday_draft("First", (10, 0), (11, 0)),
            friday_draft("Second", (10, 30), (11, 30)),
        ]),
        OverlapPolicy::Evict,
    );
    let mut events = EventSet::new();

    let outcome = scheduler.schedule("double booking", monday_morning(), &mut events).await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events.iter().next().unwrap().title, "Second");
    assert_eq!(outcome.scheduled.len(), 1);
    assert_eq!(outcome.scheduled[0].title, "Second");
}

#[tokio::test]
async fn reject_policy_keeps_the_original_booking() {
    let scheduler = scheduler(
        ScriptedProvider::returning(vec![friday_draft("Intruder", (10, 0), (11, 0))]),
        OverlapPolicy::Reject,
    );
    let mut events = EventSet::new();
    events.insert(Event::from_draft(friday_draft("Original", (10, 30), (11, 30))));

    let outcome = scheduler.schedule("intruder", monday_morning(), &mut events).await.unwrap();

    assert!(outcome.scheduled.is_empty());
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(events.len(), 1);
    assert_eq!(events.iter().next().unwrap().title, "Original");
}

#[tokio::test]
async fn garbled_request_fails_without_mutating_state() {
    let scheduler = scheduler(ScriptedProvider::unreachable(), OverlapPolicy::Evict);
    let mut events = EventSet::new();
    events.insert(Event::from_draft(friday_draft("Keep me", (10, 0), (11, 0))));

    let err = scheduler
        .schedule("please do the thing sometime", monday_morning(), &mut events)
        .await
        .unwrap_err();

    assert!(matches!(err, ScheduleError::Extraction(_)));
    assert_eq!(events.len(), 1);
    assert_eq!(events.iter().next().unwrap().title, "Keep me");
}

#[tokio::test]
async fn cancellation_removes_exactly_one_event() {
    let scheduler = scheduler(
        ScriptedProvider::returning(vec![
            friday_draft("Morning run", (7, 0), (8, 0)),
            friday_draft("Retro", (16, 0), (17, 0)),
        ]),
        OverlapPolicy::Evict,
    );
    let mut events = EventSet::new();
    let outcome = scheduler.schedule("two events", monday_morning(), &mut events).await.unwrap();
    assert_eq!(events.len(), 2);

    let cancelled = events.remove(outcome.scheduled[0].id).unwrap();
    assert_eq!(cancelled.title, "Morning run");
    assert_eq!(events.len(), 1);
    assert_eq!(events.iter().next().unwrap().title, "Retro");
}
