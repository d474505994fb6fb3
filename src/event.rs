//! Event data model and the owned event collection.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated event candidate before it is admitted to the set.
///
/// Drafts come out of either an AI provider response or the fallback
/// extractor; `start < end` on the same date is enforced at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl EventDraft {
    /// Build a draft, rejecting empty spans and overnight spans.
    pub fn new(title: impl Into<String>, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Option<Self> {
        if start >= end {
            return None;
        }
        let title = title.into();
        let title = if title.trim().is_empty() {
            "Untitled event".to_string()
        } else {
            title.trim().to_string()
        };
        Some(Self { title, date, start, end })
    }
}

/// A scheduled event. The id is assigned at creation and is the handle used
/// for eviction and cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Event {
    pub fn from_draft(draft: EventDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            date: draft.date,
            start: draft.start,
            end: draft.end,
        }
    }
}

/// The authoritative collection of scheduled events.
///
/// Insertion order is kept for display; scheduling semantics never depend on
/// it. The set is owned by whoever drives the pipeline and is only mutated
/// through [`EventSet::insert`] and [`EventSet::remove`].
#[derive(Debug, Default, Clone)]
pub struct EventSet {
    events: Vec<Event>,
}

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn insert(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Remove an event by id, returning it if present.
    pub fn remove(&mut self, id: Uuid) -> Option<Event> {
        let pos = self.events.iter().position(|e| e.id == id)?;
        Some(self.events.remove(pos))
    }
}
