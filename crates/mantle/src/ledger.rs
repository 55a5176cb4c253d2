//! Per-task history of attempted actions
//!
//! Append-only, insertion-ordered. One entry per outcome, written by that
//! task's own loop or the dispatcher acting for it, read by the reflection
//! policy and by audit. No entry is ever removed or reordered.

use dashmap::DashMap;
use uuid::Uuid;

use crate::tools::outcome::Outcome;

/// Append-only ledger of outcomes, keyed by task
#[derive(Debug, Default)]
pub struct TaskLedger {
    entries: DashMap<Uuid, Vec<Outcome>>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Append an outcome to its task's history
    pub fn append(&self, outcome: Outcome) {
        self.entries
            .entry(outcome.task_id)
            .or_default()
            .push(outcome);
    }

    /// Snapshot of a task's full history, insertion order
    pub fn history(&self, task_id: Uuid) -> Vec<Outcome> {
        self.entries
            .get(&task_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Entries appended at or after the given index
    pub fn since(&self, task_id: Uuid, index: usize) -> Vec<Outcome> {
        self.entries
            .get(&task_id)
            .map(|e| e.iter().skip(index).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of entries for a task
    pub fn len(&self, task_id: Uuid) -> usize {
        self.entries.get(&task_id).map(|e| e.len()).unwrap_or(0)
    }

    /// Whether a task has any entries
    pub fn is_empty(&self, task_id: Uuid) -> bool {
        self.len(task_id) == 0
    }
}
