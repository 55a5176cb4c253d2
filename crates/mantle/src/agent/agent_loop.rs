//! The think-act-reflect loop
//!
//! `CognitiveLoop` is the explicit transition function over [`Phase`].
//! It owns no tools and no ledger; all invocations go through a shared
//! [`Dispatcher`], so many loops can run against one runtime. The loop
//! imposes no concurrency bound of its own.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::tools::dispatch::Dispatcher;
use crate::tools::outcome::Outcome;
use crate::tools::{ToolCall, ToolContext};

use super::planner::Planner;
use super::reflect::{Reflector, Verdict};
use super::state::{AgentConfig, Phase, PlanStep, TaskState};

pub struct CognitiveLoop {
    planner: Arc<dyn Planner>,
    reflector: Arc<dyn Reflector>,
    dispatcher: Arc<Dispatcher>,
    config: AgentConfig,
}

impl CognitiveLoop {
    pub fn new(
        planner: Arc<dyn Planner>,
        reflector: Arc<dyn Reflector>,
        dispatcher: Arc<Dispatcher>,
        config: AgentConfig,
    ) -> Self {
        Self {
            planner,
            reflector,
            dispatcher,
            config,
        }
    }

    /// Drive one task from goal to a terminal phase. Failures are
    /// encoded in the returned state, never panics or early returns.
    #[instrument(skip(self, goal))]
    pub async fn run(&self, goal: &str) -> TaskState {
        let mut state = TaskState::new(goal);
        let ctx = self.tool_context(state.task_id);

        info!(task = %state.task_id, "Task started");

        while !state.phase.is_terminal() {
            match state.phase {
                Phase::Thinking => self.think(&mut state).await,
                Phase::Acting => self.act(&mut state, &ctx).await,
                Phase::Reflecting => self.reflect(&mut state).await,
                Phase::Done | Phase::Failed => break,
            }
        }

        info!(task = %state.task_id, phase = %state.phase, iterations = state.iteration, "Task finished");
        state
    }

    fn tool_context(&self, task_id: Uuid) -> ToolContext {
        let mut ctx = ToolContext::new(task_id).with_working_dir(self.config.working_dir.clone());
        if let Some(paths) = &self.config.allowed_paths {
            ctx = ctx.with_allowed_paths(paths.clone());
        }
        if let Some(user) = &self.config.user_id {
            ctx = ctx.with_user(user.clone());
        }
        ctx
    }

    /// THINK: produce a plan. A planner error or an empty plan is fatal
    /// to the task.
    async fn think(&self, state: &mut TaskState) {
        let definitions = self.dispatcher.registry().definitions();

        match self
            .planner
            .plan(&state.goal, &state.lessons, &definitions)
            .await
        {
            Ok(plan) if plan.is_empty() => {
                state.mark_failed("planner produced an empty plan");
            }
            Ok(plan) => {
                info!(steps = plan.len(), "Plan adopted");
                state.adopt_plan(plan);
            }
            Err(e) => {
                warn!(error = %e, "Planning failed");
                state.mark_failed(format!("planning failed: {:#}", e));
            }
        }
    }

    /// ACT: execute the next chunk of steps sequentially, then hand off
    /// to REFLECT. A Respond step needs no tool; it appends a synthetic
    /// success entry so the reflector sees it in the history.
    async fn act(&self, state: &mut TaskState, ctx: &ToolContext) {
        let mut executed = 0;
        while executed < self.config.reflect_every && state.steps_remaining() > 0 {
            let step = match &state.plan {
                Some(plan) => plan.steps[state.cursor].clone(),
                None => break,
            };
            state.cursor += 1;
            executed += 1;

            match step {
                PlanStep::Invoke { tool, arguments } => {
                    let call = ToolCall::new(tool, arguments);
                    let outcome = self.dispatcher.execute(&call, ctx, None).await;
                    if !outcome.success {
                        warn!(tool = %outcome.tool, kind = ?outcome.error_kind, "Step failed");
                    }
                }
                PlanStep::Respond { text } => {
                    let response = text.unwrap_or_default();
                    self.dispatcher.ledger().append(Outcome::success(
                        Uuid::new_v4(),
                        state.task_id,
                        "respond",
                        response.clone(),
                        Utc::now(),
                    ));
                    state.final_response = Some(response);
                }
            }
        }

        state.phase = Phase::Reflecting;
    }

    /// REFLECT: judge the outcomes since the last reflection and apply
    /// the verdict. The oracle runs under its own deadline; a timeout or
    /// error degrades to Continue rather than failing the task.
    async fn reflect(&self, state: &mut TaskState) {
        let ledger = self.dispatcher.ledger();
        let recent = ledger.since(state.task_id, state.reflected_len);
        state.reflected_len = ledger.len(state.task_id);

        let reflection = match tokio::time::timeout(
            self.config.reflect_timeout,
            self.reflector.reflect(&state.goal, &recent),
        )
        .await
        {
            Ok(Ok(reflection)) => reflection,
            Ok(Err(e)) => {
                warn!(error = %e, "Reflection errored, continuing");
                super::reflect::Reflection::default_continue("reflection errored")
            }
            Err(_) => {
                warn!("Reflection timed out, continuing");
                super::reflect::Reflection::default_continue("reflection timed out")
            }
        };

        state.lessons.extend(reflection.lessons);
        for note in &reflection.failures {
            if !note.suggestion.is_empty() {
                state.lessons.push(format!("{}: {}", note.tool, note.suggestion));
            }
        }

        state.iteration += 1;
        info!(iteration = state.iteration, verdict = ?reflection.verdict, "Reflection applied");

        match reflection.verdict {
            Verdict::Complete => {
                let response = state
                    .final_response
                    .clone()
                    .unwrap_or(reflection.assessment);
                state.mark_done(response);
            }
            _ if state.iteration >= self.config.max_iterations => {
                state.mark_failed(format!(
                    "iteration budget exhausted after {} iterations",
                    state.iteration
                ));
            }
            Verdict::Replan => {
                if let Some(focus) = reflection.next_focus {
                    state.lessons.push(focus);
                }
                state.discard_plan();
            }
            Verdict::Continue => {
                // Exhausted plan plus Continue falls through to a fresh plan
                if state.steps_remaining() > 0 {
                    state.phase = Phase::Acting;
                } else {
                    state.discard_plan();
                }
            }
        }
    }
}
