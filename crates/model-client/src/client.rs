//! HTTP client for Ollama-compatible chat endpoints

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options for a generation request
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "num_predict")]
    pub max_tokens: Option<i32>,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Other,
}

/// Token accounting for one generation
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One completed generation
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

/// A black-box text generator: system prompt plus history in, text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        history: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<Generation>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Client for an Ollama-compatible /api/chat endpoint
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpModelClient {
    /// Create a new client with the given request timeout
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            client,
        })
    }

    /// Model name this client generates with
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the endpoint is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl LanguageModel for HttpModelClient {
    async fn generate(
        &self,
        system: &str,
        history: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<Generation> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(history.len() + 1);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.extend_from_slice(history);

        let req = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options,
        };

        tracing::debug!(model = %self.model, messages = req.messages.len(), "Sending chat request");

        let resp: ChatResponse = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("Failed to reach model endpoint")?
            .error_for_status()
            .context("Model endpoint returned error status")?
            .json()
            .await
            .context("Failed to parse chat response")?;

        let finish_reason = match resp.done_reason.as_deref() {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(_) => FinishReason::Other,
        };

        Ok(Generation {
            text: resp.message.content,
            finish_reason,
            usage: TokenUsage {
                prompt_tokens: resp.prompt_eval_count.unwrap_or(0),
                completion_tokens: resp.eval_count.unwrap_or(0),
            },
        })
    }
}
