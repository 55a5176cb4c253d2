//! model-client: language model access for the mantle runtime
//!
//! Provides:
//! - The `LanguageModel` trait (one generation per call, no streaming)
//! - An HTTP client for Ollama-compatible chat endpoints
//! - Configuration loading (model.toml)

pub mod client;
pub mod config;

pub use client::{
    ChatMessage, FinishReason, Generation, GenerationOptions, HttpModelClient, LanguageModel,
    Role, TokenUsage,
};
pub use config::ModelConfig;
