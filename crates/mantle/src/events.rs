//! Lifecycle event channel
//!
//! Fan-out notification for invocation lifecycle events. Built on
//! `tokio::sync::broadcast`: each subscriber has its own bounded queue, a
//! slow subscriber lags and drops events rather than stalling the
//! dispatcher, and a subscriber panic is isolated to its own task.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::tools::outcome::Outcome;

const DEFAULT_CAPACITY: usize = 256;

/// Lifecycle phase of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Requested,
    Completed,
    Failed,
}

impl std::fmt::Display for EventPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventPhase::Requested => "requested",
            EventPhase::Completed => "completed",
            EventPhase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One lifecycle event
#[derive(Debug, Clone)]
pub struct ToolEvent {
    pub invocation_id: Uuid,
    pub task_id: Uuid,
    pub tool: String,
    pub phase: EventPhase,
    pub at: DateTime<Utc>,
    /// Present on terminal events
    pub outcome: Option<Outcome>,
}

impl ToolEvent {
    /// Event marking the start of an invocation
    pub fn requested(invocation_id: Uuid, task_id: Uuid, tool: impl Into<String>) -> Self {
        Self {
            invocation_id,
            task_id,
            tool: tool.into(),
            phase: EventPhase::Requested,
            at: Utc::now(),
            outcome: None,
        }
    }

    /// Terminal event carrying the finalized outcome
    pub fn terminal(outcome: &Outcome) -> Self {
        Self {
            invocation_id: outcome.invocation_id,
            task_id: outcome.task_id,
            tool: outcome.tool.clone(),
            phase: if outcome.success {
                EventPhase::Completed
            } else {
                EventPhase::Failed
            },
            at: Utc::now(),
            outcome: Some(outcome.clone()),
        }
    }
}

/// Multi-subscriber event bus
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ToolEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to every current subscriber.
    /// Emitting with no subscribers is not an error.
    pub fn emit(&self, event: ToolEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("no event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
