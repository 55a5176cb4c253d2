//! Plan production for the THINKING phase

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use model_client::{ChatMessage, GenerationOptions, LanguageModel};

use crate::tools::ToolDefinition;

use super::parse::parse_json_reply;
use super::state::{Plan, PlanStep};

/// Produces an ordered plan for a goal. The loop treats a planner error
/// as fatal to the task.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        goal: &str,
        lessons: &[String],
        tools: &[ToolDefinition],
    ) -> Result<Plan>;
}

/// Planner backed by a language model
pub struct LlmPlanner {
    model: Arc<dyn LanguageModel>,
    options: GenerationOptions,
}

impl LlmPlanner {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            options: GenerationOptions {
                temperature: Some(0.2),
                max_tokens: None,
            },
        }
    }

    fn system_prompt(tools: &[ToolDefinition]) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "You are the planning stage of an autonomous agent. \
             Break the task into an ordered list of steps.\n\n",
        );

        prompt.push_str("## Available tools\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            if let Ok(schema) = serde_json::to_string(&tool.parameters) {
                prompt.push_str(&format!("  parameters: {}\n", schema));
            }
        }

        prompt.push_str(
            "\n## Output format\n\
             Reply with JSON only:\n\
             {\"steps\": [\n\
               {\"action\": \"invoke\", \"tool\": \"<name>\", \"arguments\": {...}},\n\
               {\"action\": \"respond\", \"text\": \"<final answer to the user>\"}\n\
             ]}\n\
             Use only the tools listed above. End with a respond step \
             once no more tool output is needed.",
        );

        prompt
    }

    fn user_prompt(goal: &str, lessons: &[String]) -> String {
        let mut prompt = format!("Task: {}\n", goal);
        if !lessons.is_empty() {
            prompt.push_str("\nLessons from earlier attempts:\n");
            for lesson in lessons {
                prompt.push_str(&format!("- {}\n", lesson));
            }
        }
        prompt
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(
        &self,
        goal: &str,
        lessons: &[String],
        tools: &[ToolDefinition],
    ) -> Result<Plan> {
        let system = Self::system_prompt(tools);
        let history = vec![ChatMessage::user(Self::user_prompt(goal, lessons))];

        let generation = self
            .model
            .generate(&system, &history, &self.options)
            .await
            .context("planning model call failed")?;

        debug!(reply_len = generation.text.len(), "Planner reply received");

        let plan: Plan = parse_json_reply(&generation.text)
            .with_context(|| format!("no plan found in planner reply: {}", truncated(&generation.text)))?;

        // Drop invoke steps with empty tool names rather than letting
        // them fail dispatch later.
        let steps: Vec<PlanStep> = plan
            .steps
            .into_iter()
            .filter(|s| match s {
                PlanStep::Invoke { tool, .. } => !tool.is_empty(),
                PlanStep::Respond { .. } => true,
            })
            .collect();

        info!(steps = steps.len(), "Plan produced");
        Ok(Plan::new(steps))
    }
}

fn truncated(s: &str) -> String {
    const LIMIT: usize = 200;
    if s.len() <= LIMIT {
        s.to_string()
    } else {
        let end = s
            .char_indices()
            .take_while(|(i, _)| *i < LIMIT)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &s[..end])
    }
}
