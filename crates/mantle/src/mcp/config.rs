//! MCP server configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration for one MCP server, the `[[mcp.servers]]` config block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique name, used as the tool name prefix
    pub name: String,
    /// Command that runs the server
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables; values support ${VAR} expansion
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Whether to start this server automatically
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
    /// Initialization timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_auto_start() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            auto_start: true,
            timeout_secs: 30,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Expand ${VAR} references in env values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        for value in self.env.values_mut() {
            *value = expand_env_string(value)?;
        }
        Ok(())
    }
}

/// Expand ${VAR} patterns using process environment variables
pub fn expand_env_string(s: &str) -> Result<String> {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(rest);
            return Ok(result);
        };

        let var_name = &after[..end];
        let var_value = std::env::var(var_name)
            .with_context(|| format!("Environment variable {} not set", var_name))?;

        result.push_str(&rest[..start]);
        result.push_str(&var_value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}
