//! Configuration management for model.toml

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Model endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Model used for planning and reflection
    #[serde(default = "default_model")]
    pub default: String,
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_model() -> String {
    "llama3.2".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
        }
    }
}

impl ModelConfig {
    /// Load configuration from model.toml
    pub fn load() -> Result<Self> {
        Self::load_from(Self::find_config_path()?)
    }

    /// Try to load configuration, returning None if not found
    pub fn try_load() -> Option<Self> {
        Self::load().ok()
    }

    /// Minimal default for when model.toml is missing
    pub fn default_minimal() -> Self {
        Self {
            endpoint: EndpointConfig {
                host: "127.0.0.1".to_string(),
                port: 11434,
                request_timeout_secs: default_request_timeout_secs(),
            },
            models: ModelsConfig::default(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Find model.toml by searching current directory and parents
    pub fn find_config_path() -> Result<PathBuf> {
        let mut current = std::env::current_dir()?;

        for _ in 0..10 {
            let candidate = current.join("model.toml");
            if candidate.exists() {
                return Ok(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        anyhow::bail!("model.toml not found in current directory or parents")
    }

    /// Base URL of the chat endpoint
    pub fn endpoint_url(&self) -> String {
        format!("http://{}:{}", self.endpoint.host, self.endpoint.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[endpoint]
host = "127.0.0.1"
port = 11434
request_timeout_secs = 90

[models]
default = "qwen2.5-coder:7b"
"#;

        let config: ModelConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint.port, 11434);
        assert_eq!(config.endpoint.request_timeout_secs, 90);
        assert_eq!(config.models.default, "qwen2.5-coder:7b");
        assert_eq!(config.endpoint_url(), "http://127.0.0.1:11434");
    }

    #[test]
    fn test_parse_config_defaults() {
        let toml = r#"
[endpoint]
host = "localhost"
port = 8080
"#;

        let config: ModelConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint.request_timeout_secs, 120);
        assert_eq!(config.models.default, "llama3.2");
    }
}
