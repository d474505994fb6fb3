//! Overlap detection and conflict resolution against the event set.
//!
//! Events are half-open intervals on a single date: two events conflict iff
//! `a.start < b.end && a.end > b.start` on the same date, so touching
//! endpoints never count as a conflict.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{Event, EventSet};

/// What to do when a new event overlaps existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// New event always wins: every overlapping event is evicted.
    Evict,
    /// Refuse the new event and leave the set untouched.
    Reject,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        OverlapPolicy::Evict
    }
}

/// The resolver's verdict for one candidate. The caller applies it to the
/// set; `resolve` itself never mutates anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Insert the candidate after evicting the listed events.
    Insert { event: Event, evict: Vec<Uuid> },
    /// Policy refused the candidate; the listed events caused the refusal.
    Rejected { event: Event, conflicts: Vec<Uuid> },
}

fn overlaps(a: &Event, b: &Event) -> bool {
    a.date == b.date && a.start < b.end && a.end > b.start
}

/// Decide the fate of one candidate against the current set.
pub fn resolve(candidate: Event, existing: &EventSet, policy: OverlapPolicy) -> Resolution {
    let conflicts: Vec<Uuid> =
        existing.iter().filter(|e| overlaps(e, &candidate)).map(|e| e.id).collect();

    match policy {
        OverlapPolicy::Evict => Resolution::Insert { event: candidate, evict: conflicts },
        OverlapPolicy::Reject if conflicts.is_empty() => {
            Resolution::Insert { event: candidate, evict: conflicts }
        }
        OverlapPolicy::Reject => Resolution::Rejected { event: candidate, conflicts },
    }
}

/// Apply a resolution to the set, returning the evicted events.
///
/// Eviction and insertion happen together so a request is never observed
/// half-applied.
pub fn apply(resolution: Resolution, set: &mut EventSet) -> Vec<Event> {
    match resolution {
        Resolution::Insert { event, evict } => {
            let evicted: Vec<Event> = evict.into_iter().filter_map(|id| set.remove(id)).collect();
            set.insert(event);
            evicted
        }
        Resolution::Rejected { .. } => Vec::new(),
    }
}
