//! Task state and loop configuration

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Phase of the cognitive loop. Done and Failed are terminal; a finished
/// task is never resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Thinking,
    Acting,
    Reflecting,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Thinking => "thinking",
            Phase::Acting => "acting",
            Phase::Reflecting => "reflecting",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One unit of a plan: a tool call, or a direct response needing no tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PlanStep {
    Invoke {
        tool: String,
        #[serde(default)]
        arguments: Value,
    },
    Respond {
        #[serde(default)]
        text: Option<String>,
    },
}

/// Ordered steps produced by the planner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Configuration for one cognitive loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Iteration budget; exceeding it fails the task
    pub max_iterations: usize,
    /// Plan steps executed between reflections
    pub reflect_every: usize,
    /// Deadline for the reflection oracle itself
    pub reflect_timeout: Duration,
    /// Working directory for tool contexts
    pub working_dir: PathBuf,
    /// Filesystem allow-list propagated to tool contexts
    pub allowed_paths: Option<Vec<PathBuf>>,
    /// User the task runs for
    pub user_id: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            reflect_every: 1,
            reflect_timeout: Duration::from_millis(30_000),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            allowed_paths: None,
            user_id: None,
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_reflect_every(mut self, steps: usize) -> Self {
        self.reflect_every = steps.max(1);
        self
    }

    pub fn with_reflect_timeout(mut self, timeout: Duration) -> Self {
        self.reflect_timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_allowed_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.allowed_paths = Some(paths);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// State of one task as it moves through the loop
#[derive(Debug)]
pub struct TaskState {
    pub task_id: Uuid,
    pub goal: String,
    pub phase: Phase,
    /// Current plan, if one has been produced
    pub plan: Option<Plan>,
    /// Index of the next unexecuted step
    pub cursor: usize,
    /// Completed think-act-reflect cycles
    pub iteration: usize,
    /// Lessons accumulated from reflections, seeded into replans
    pub lessons: Vec<String>,
    /// Final answer, set when the task completes
    pub final_response: Option<String>,
    /// Failure description, set when the task fails
    pub error: Option<String>,
    /// Ledger length at the last reflection
    pub reflected_len: usize,
}

impl TaskState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            goal: goal.into(),
            phase: Phase::Thinking,
            plan: None,
            cursor: 0,
            iteration: 0,
            lessons: Vec::new(),
            final_response: None,
            error: None,
            reflected_len: 0,
        }
    }

    /// Steps remaining in the current plan
    pub fn steps_remaining(&self) -> usize {
        self.plan
            .as_ref()
            .map(|p| p.len().saturating_sub(self.cursor))
            .unwrap_or(0)
    }

    /// Adopt a fresh plan and move to ACT
    pub fn adopt_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
        self.cursor = 0;
        self.phase = Phase::Acting;
    }

    /// Discard remaining steps ahead of a replan
    pub fn discard_plan(&mut self) {
        self.plan = None;
        self.cursor = 0;
        self.phase = Phase::Thinking;
    }

    pub fn mark_done(&mut self, response: impl Into<String>) {
        self.phase = Phase::Done;
        self.final_response = Some(response.into());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.phase = Phase::Failed;
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_builder() {
        let config = AgentConfig::new()
            .with_max_iterations(5)
            .with_reflect_every(2)
            .with_user("alice");

        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.reflect_every, 2);
        assert_eq!(config.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_reflect_every_floor() {
        let config = AgentConfig::new().with_reflect_every(0);
        assert_eq!(config.reflect_every, 1);
    }

    #[test]
    fn test_plan_step_deserialization() {
        let step: PlanStep =
            serde_json::from_value(json!({"action": "invoke", "tool": "file_read", "arguments": {"path": "a.txt"}}))
                .unwrap();
        assert!(matches!(step, PlanStep::Invoke { ref tool, .. } if tool == "file_read"));

        let step: PlanStep = serde_json::from_value(json!({"action": "respond", "text": "done"})).unwrap();
        assert!(matches!(step, PlanStep::Respond { text: Some(ref t) } if t == "done"));
    }

    #[test]
    fn test_task_state_transitions() {
        let mut state = TaskState::new("read the file");
        assert_eq!(state.phase, Phase::Thinking);

        state.adopt_plan(Plan::new(vec![PlanStep::Respond { text: None }]));
        assert_eq!(state.phase, Phase::Acting);
        assert_eq!(state.steps_remaining(), 1);

        state.discard_plan();
        assert_eq!(state.phase, Phase::Thinking);
        assert_eq!(state.steps_remaining(), 0);

        state.mark_done("all set");
        assert!(state.phase.is_terminal());
        assert_eq!(state.final_response.as_deref(), Some("all set"));
    }
}
