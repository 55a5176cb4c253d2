//! Runtime configuration
//!
//! Configuration file: ~/.config/mantle/config.toml (or platform
//! equivalent).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::agent::AgentConfig;
use crate::mcp::McpServerConfig;
use crate::tools::dispatch::DispatchConfig;

/// Runtime configuration for the mantle binary
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub mcp: McpSection,
}

/// The `[dispatcher]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum concurrent tool invocations
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Default per-invocation timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Timeout for network-bound tools
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,
}

/// The `[agent]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Iteration budget per task
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Plan steps executed between reflections
    #[serde(default = "default_reflect_every")]
    pub reflect_every: usize,

    /// Model name override (uses model.toml default if not set)
    #[serde(default)]
    pub model: Option<String>,
}

/// The `[security]` section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    /// Filesystem allow-list for file tools; empty means unrestricted
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,
}

/// The `[mcp]` section with its `[[mcp.servers]]` blocks
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpSection {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_network_timeout_ms() -> u64 {
    60_000
}

fn default_max_iterations() -> usize {
    10
}

fn default_reflect_every() -> usize {
    1
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            timeout_ms: default_timeout_ms(),
            network_timeout_ms: default_network_timeout_ms(),
        }
    }
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            reflect_every: default_reflect_every(),
            model: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the default location, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("mantle").join("config.toml"))
    }

    /// Create a default configuration file with comments
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path()?;

        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let default_config = r#"# mantle configuration
# Location: ~/.config/mantle/config.toml

[dispatcher]
# Maximum concurrent tool invocations
max_concurrent = 3

# Default per-invocation timeout in milliseconds
timeout_ms = 30000

# Timeout for network-bound tools in milliseconds
network_timeout_ms = 60000

[agent]
# Iteration budget per task
max_iterations = 10

# Plan steps executed between reflections
reflect_every = 1

# Model name override (uses model.toml default if not set)
# model = "llama3.1:8b"

[security]
# Filesystem allow-list for file tools; empty means unrestricted
# allowed_paths = ["/home/me/projects"]
allowed_paths = []

# MCP servers to start at launch
# [[mcp.servers]]
# name = "github"
# command = "npx"
# args = ["-y", "@modelcontextprotocol/server-github"]
#
# [mcp.servers.env]
# GITHUB_TOKEN = "${GITHUB_TOKEN}"
"#;

        fs::write(&path, default_config)?;

        Ok(path)
    }

    /// Dispatcher limits from the `[dispatcher]` section
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_concurrent: self.dispatcher.max_concurrent,
            default_timeout: Duration::from_millis(self.dispatcher.timeout_ms),
            network_timeout: Duration::from_millis(self.dispatcher.network_timeout_ms),
        }
    }

    /// Loop configuration from the `[agent]` and `[security]` sections
    pub fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::new()
            .with_max_iterations(self.agent.max_iterations)
            .with_reflect_every(self.agent.reflect_every);
        if !self.security.allowed_paths.is_empty() {
            config = config.with_allowed_paths(self.security.allowed_paths.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.dispatcher.max_concurrent, 3);
        assert_eq!(config.dispatcher.timeout_ms, 30_000);
        assert_eq!(config.dispatcher.network_timeout_ms, 60_000);
        assert_eq!(config.agent.max_iterations, 10);
        assert!(config.security.allowed_paths.is_empty());
        assert!(config.mcp.servers.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [dispatcher]
            max_concurrent = 5
            timeout_ms = 10000

            [agent]
            max_iterations = 4
            model = "llama3.1:8b"

            [security]
            allowed_paths = ["/tmp/sandbox"]

            [[mcp.servers]]
            name = "github"
            command = "npx"
            args = ["-y", "@modelcontextprotocol/server-github"]
        "#;

        let config: RuntimeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.dispatcher.max_concurrent, 5);
        // Unset keys keep their defaults
        assert_eq!(config.dispatcher.network_timeout_ms, 60_000);
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.model.as_deref(), Some("llama3.1:8b"));
        assert_eq!(config.security.allowed_paths.len(), 1);
        assert_eq!(config.mcp.servers[0].name, "github");
    }

    #[test]
    fn test_dispatch_config_conversion() {
        let config = RuntimeConfig::default();
        let dispatch = config.dispatch_config();
        assert_eq!(dispatch.max_concurrent, 3);
        assert_eq!(dispatch.default_timeout, Duration::from_millis(30_000));
        assert_eq!(dispatch.network_timeout, Duration::from_millis(60_000));
    }

    #[test]
    fn test_agent_config_conversion() {
        let toml_str = r#"
            [agent]
            max_iterations = 2

            [security]
            allowed_paths = ["/tmp/a", "/tmp/b"]
        "#;

        let config: RuntimeConfig = toml::from_str(toml_str).unwrap();
        let agent = config.agent_config();
        assert_eq!(agent.max_iterations, 2);
        assert_eq!(agent.allowed_paths.as_ref().map(|p| p.len()), Some(2));
    }
}
