//! Cognitive loop: THINK, ACT, REFLECT until the task is judged done

pub mod agent_loop;
mod parse;
pub mod planner;
pub mod reflect;
pub mod state;

pub use agent_loop::CognitiveLoop;
pub use planner::{LlmPlanner, Planner};
pub use reflect::{LlmReflector, Reflection, Reflector, Verdict};
pub use state::{AgentConfig, Phase, Plan, PlanStep, TaskState};
