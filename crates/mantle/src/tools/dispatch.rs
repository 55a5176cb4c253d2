//! Invocation dispatcher
//!
//! The concurrency-and-failure engine: validates input, acquires a permit
//! from the global semaphore, runs the tool with a deadline, and normalizes
//! every path into a well-formed [`Outcome`]. Tool failures never escape
//! this boundary as errors.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::events::{EventBus, ToolEvent};
use crate::ledger::TaskLedger;

use super::outcome::{ErrorKind, Outcome};
use super::registry::ToolRegistry;
use super::{ToolCall, ToolCategory, ToolContext, ToolError};

/// Dispatcher limits, from the `[dispatcher]` config section
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// At most this many invocations execute simultaneously
    pub max_concurrent: usize,
    /// Deadline for most tools
    pub default_timeout: Duration,
    /// Deadline for network-bound tools (Network and External categories)
    pub network_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            default_timeout: Duration::from_millis(30_000),
            network_timeout: Duration::from_millis(60_000),
        }
    }
}

/// Dispatches tool calls under a global concurrency bound
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    ledger: Arc<TaskLedger>,
    events: EventBus,
    permits: Arc<Semaphore>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        ledger: Arc<TaskLedger>,
        events: EventBus,
        config: DispatchConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            registry,
            ledger,
            events,
            permits,
            config,
        }
    }

    /// The shared registry
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// The shared ledger
    pub fn ledger(&self) -> &Arc<TaskLedger> {
        &self.ledger
    }

    /// The lifecycle event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Permits currently free; equals `max_concurrent` when idle
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Execute one tool call and return its normalized outcome.
    ///
    /// Unknown names and schema violations short-circuit without
    /// acquiring a permit. Otherwise the call waits for a permit (the
    /// sole backpressure mechanism), then runs under a deadline:
    /// `timeout` if given, else the network default for Network and
    /// External tools, else the base default.
    ///
    /// On timeout the in-flight future is dropped; tools are cancelled
    /// at their next await point, but work they already handed off may
    /// run to completion in the background. Callers must not assume
    /// resources are reclaimed.
    #[instrument(skip(self, ctx), fields(tool = %call.name, task = %ctx.task_id))]
    pub async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        timeout: Option<Duration>,
    ) -> Outcome {
        let invocation_id = Uuid::new_v4();
        let started_at = Utc::now();

        self.events
            .emit(ToolEvent::requested(invocation_id, ctx.task_id, &call.name));

        // Step 1: lookup, no permit on failure
        let tool = match self.registry.get(&call.name) {
            Some(t) => t,
            None => {
                warn!(tool = %call.name, "Tool not found");
                let outcome = Outcome::failure(
                    invocation_id,
                    ctx.task_id,
                    &call.name,
                    ErrorKind::NotFound,
                    format!("unknown tool: {}", call.name),
                    started_at,
                );
                return self.finalize(outcome);
            }
        };

        // Step 2: validation, no permit and no timer on failure
        if let Err(violations) = tool.parameters_schema().validate(&call.arguments) {
            debug!(tool = %call.name, ?violations, "Arguments rejected by schema");
            let outcome = Outcome::failure(
                invocation_id,
                ctx.task_id,
                &call.name,
                ErrorKind::ValidationFailed,
                violations.join("; "),
                started_at,
            );
            return self.finalize(outcome);
        }

        // Step 3: one permit from the global semaphore. Waiters queue
        // FIFO; only max_concurrent invocations run at once.
        let permit = match self.permits.acquire().await {
            Ok(p) => p,
            Err(_) => {
                let outcome = Outcome::failure(
                    invocation_id,
                    ctx.task_id,
                    &call.name,
                    ErrorKind::ExecutionFailed,
                    "dispatcher is shut down",
                    started_at,
                );
                return self.finalize(outcome);
            }
        };

        let deadline = timeout.unwrap_or_else(|| self.deadline_for(tool.category()));
        debug!(tool = %call.name, deadline_ms = deadline.as_millis() as u64, "Executing tool");

        let run = tokio::time::timeout(deadline, tool.execute(&call.arguments, ctx)).await;
        drop(permit);

        let outcome = match run {
            Err(_) => {
                warn!(tool = %call.name, deadline_ms = deadline.as_millis() as u64, "Tool timed out");
                Outcome::failure(
                    invocation_id,
                    ctx.task_id,
                    &call.name,
                    ErrorKind::Timeout,
                    format!("deadline of {} ms elapsed", deadline.as_millis()),
                    started_at,
                )
            }
            Ok(Err(e)) => {
                let kind = match e.downcast_ref::<ToolError>() {
                    Some(ToolError::PermissionDenied(_)) => ErrorKind::PermissionDenied,
                    None => ErrorKind::ExecutionFailed,
                };
                warn!(tool = %call.name, error = %e, kind = %kind, "Tool raised");
                Outcome::failure(invocation_id, ctx.task_id, &call.name, kind, e.to_string(), started_at)
            }
            Ok(Ok(result)) => {
                if result.success {
                    info!(tool = %call.name, output_len = result.output.len(), "Tool succeeded");
                    Outcome::success(invocation_id, ctx.task_id, &call.name, result.output, started_at)
                } else {
                    warn!(tool = %call.name, error = ?result.error, "Tool reported failure");
                    Outcome::failure(
                        invocation_id,
                        ctx.task_id,
                        &call.name,
                        ErrorKind::ExecutionFailed,
                        result.error.unwrap_or_else(|| "tool reported failure".to_string()),
                        started_at,
                    )
                }
            }
        };

        self.finalize(outcome)
    }

    fn deadline_for(&self, category: ToolCategory) -> Duration {
        match category {
            ToolCategory::Network | ToolCategory::External => self.config.network_timeout,
            _ => self.config.default_timeout,
        }
    }

    /// Terminal event, usage accounting, ledger append. Every execute
    /// path ends here exactly once.
    fn finalize(&self, outcome: Outcome) -> Outcome {
        self.events.emit(ToolEvent::terminal(&outcome));
        self.registry.record_usage(&outcome.tool, &outcome);
        self.ledger.append(outcome.clone());
        outcome
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("max_concurrent", &self.config.max_concurrent)
            .finish()
    }
}
