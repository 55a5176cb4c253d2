//! Reflection policy: judge recent history, return a verdict
//!
//! The loop treats the reflector as an opaque oracle. It must return
//! exactly one verdict and, on ambiguous or missing evidence, default to
//! Continue rather than erroring.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use model_client::{ChatMessage, GenerationOptions, LanguageModel};

use crate::tools::outcome::Outcome;

use super::parse::parse_json_reply;

/// Decision for the next loop transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Proceed to the next plan step
    Continue,
    /// Discard remaining steps and plan again
    Replan,
    /// The task is finished, possibly with partial success
    Complete,
}

/// One recent failure with a suggested remedy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureNote {
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub suggestion: String,
}

/// Full reflection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub verdict: Verdict,
    #[serde(default)]
    pub assessment: String,
    #[serde(default)]
    pub lessons: Vec<String>,
    #[serde(default)]
    pub next_focus: Option<String>,
    #[serde(default)]
    pub failures: Vec<FailureNote>,
}

impl Reflection {
    /// The fallback when evidence is ambiguous or the oracle misbehaves
    pub fn default_continue(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Continue,
            assessment: reason.into(),
            lessons: Vec::new(),
            next_focus: None,
            failures: Vec::new(),
        }
    }
}

/// Pure function of the goal plus the outcomes since the last reflection
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(&self, goal: &str, recent: &[Outcome]) -> Result<Reflection>;
}

/// Reflector backed by a language model
pub struct LlmReflector {
    model: Arc<dyn LanguageModel>,
    options: GenerationOptions,
}

impl LlmReflector {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            options: GenerationOptions {
                temperature: Some(0.0),
                max_tokens: None,
            },
        }
    }

    const SYSTEM: &'static str = "You are the reflection stage of an autonomous agent. \
        Given the task and the results of recent actions, decide whether to \
        continue the current plan, replan from scratch, or mark the task \
        complete.\n\n\
        Reply with JSON only:\n\
        {\"verdict\": \"continue\" | \"replan\" | \"complete\",\n\
         \"assessment\": \"one-sentence judgement\",\n\
         \"lessons\": [\"things the next plan should know\"],\n\
         \"next_focus\": \"optional hint\",\n\
         \"failures\": [{\"tool\": \"...\", \"error\": \"...\", \"suggestion\": \"...\"}]}\n\
        When the evidence is ambiguous, choose continue.";

    fn user_prompt(goal: &str, recent: &[Outcome]) -> String {
        let mut prompt = format!("Task: {}\n\nRecent actions:\n", goal);
        if recent.is_empty() {
            prompt.push_str("(none)\n");
        }
        for outcome in recent {
            if outcome.success {
                let output = outcome.output.as_deref().unwrap_or("");
                prompt.push_str(&format!(
                    "- {} succeeded in {} ms: {}\n",
                    outcome.tool,
                    outcome.duration_ms,
                    first_line(output)
                ));
            } else {
                prompt.push_str(&format!(
                    "- {} failed ({}): {}\n",
                    outcome.tool,
                    outcome.error_kind.map(|k| k.to_string()).unwrap_or_default(),
                    outcome.error.as_deref().unwrap_or("")
                ));
            }
        }
        prompt
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

#[async_trait]
impl Reflector for LlmReflector {
    async fn reflect(&self, goal: &str, recent: &[Outcome]) -> Result<Reflection> {
        let history = vec![ChatMessage::user(Self::user_prompt(goal, recent))];

        let generation = self
            .model
            .generate(Self::SYSTEM, &history, &self.options)
            .await
            .context("reflection model call failed")?;

        match parse_json_reply::<Reflection>(&generation.text) {
            Some(reflection) => {
                debug!(verdict = ?reflection.verdict, "Reflection parsed");
                Ok(reflection)
            }
            None => {
                warn!("Reflection reply unparseable, defaulting to continue");
                Ok(Reflection::default_continue("reflection reply was unparseable"))
            }
        }
    }
}
