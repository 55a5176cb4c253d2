//! MCP server lifecycle
//!
//! Spawns configured servers, initializes them, discovers their tools,
//! and tears everything down at shutdown.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::client::McpClient;
use super::config::McpServerConfig;
use super::tools::ExternalTool;
use super::transport::StdioTransport;

/// State of a managed server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerState {
    Stopped,
    Running,
    Failed(String),
    ShuttingDown,
}

struct ServerHandle {
    client: Arc<Mutex<McpClient>>,
    state: ServerState,
}

/// Manager for MCP server processes
pub struct McpManager {
    servers: HashMap<String, ServerHandle>,
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            servers: HashMap::new(),
        }
    }

    /// Spawn and initialize one server
    pub async fn start_server(&mut self, mut config: McpServerConfig) -> Result<()> {
        let name = config.name.clone();
        info!(server = %name, "Starting MCP server");

        config.expand_env_vars().with_context(|| {
            format!("Failed to expand environment variables for MCP server: {}", name)
        })?;

        let transport = StdioTransport::spawn(
            &config.command,
            &config.args,
            &config.env,
            config.cwd.as_deref(),
        )
        .await
        .with_context(|| format!("Failed to spawn MCP server: {}", name))?;

        let mut client = McpClient::new(Box::new(transport));

        let init_timeout = Duration::from_secs(config.timeout_secs);
        match timeout(init_timeout, client.initialize()).await {
            Ok(Ok(result)) => {
                info!(
                    server = %name,
                    reports = %result.server_info.name,
                    version = result.server_info.version.as_deref().unwrap_or("unknown"),
                    "MCP server initialized"
                );
            }
            Ok(Err(e)) => {
                error!(server = %name, error = %e, "MCP server initialization failed");
                bail!("Failed to initialize MCP server {}: {}", name, e);
            }
            Err(_) => {
                error!(server = %name, "MCP server initialization timed out");
                bail!("MCP server {} initialization timed out", name);
            }
        }

        self.servers.insert(
            name,
            ServerHandle {
                client: Arc::new(Mutex::new(client)),
                state: ServerState::Running,
            },
        );

        Ok(())
    }

    /// Start all configured auto-start servers, returning the names that
    /// failed. A bad server never blocks the rest of the runtime.
    pub async fn start_all(&mut self, configs: Vec<McpServerConfig>) -> Vec<String> {
        let mut failures = Vec::new();

        for config in configs {
            if !config.auto_start {
                debug!(server = %config.name, "Skipping MCP server (auto_start=false)");
                continue;
            }

            let name = config.name.clone();
            if let Err(e) = self.start_server(config).await {
                warn!(server = %name, error = %e, "Failed to start MCP server");
                failures.push(name);
            }
        }

        failures
    }

    pub async fn stop_server(&mut self, name: &str) -> Result<()> {
        if let Some(mut handle) = self.servers.remove(name) {
            info!(server = %name, "Stopping MCP server");
            handle.state = ServerState::ShuttingDown;

            let mut client = handle.client.lock().await;
            if let Err(e) = client.close().await {
                warn!(server = %name, error = %e, "Error closing MCP server");
            }
        }

        Ok(())
    }

    pub async fn stop_all(&mut self) {
        let names: Vec<_> = self.servers.keys().cloned().collect();
        for name in names {
            if let Err(e) = self.stop_server(&name).await {
                warn!(server = %name, error = %e, "Error stopping MCP server");
            }
        }
    }

    pub fn running_servers(&self) -> Vec<&str> {
        self.servers
            .iter()
            .filter(|(_, h)| h.state == ServerState::Running)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn server_state(&self, name: &str) -> Option<&ServerState> {
        self.servers.get(name).map(|h| &h.state)
    }

    /// Discover tools from every running server. Listing failures are
    /// logged and skipped, never fatal.
    pub async fn discover_tools(&self) -> Result<Vec<ExternalTool>> {
        let mut all_tools = Vec::new();

        for (name, handle) in &self.servers {
            if handle.state != ServerState::Running {
                continue;
            }

            let client = handle.client.lock().await;
            match client.list_tools().await {
                Ok(tools) => {
                    debug!(server = %name, count = tools.len(), "Discovered MCP tools");
                    for tool_info in tools {
                        all_tools.push(ExternalTool::new(
                            name.clone(),
                            tool_info,
                            Arc::clone(&handle.client),
                        ));
                    }
                }
                Err(e) => {
                    warn!(server = %name, error = %e, "Failed to list MCP tools");
                }
            }
        }

        Ok(all_tools)
    }

    /// Ping every running server, marking unresponsive ones Failed
    pub async fn health_check(&mut self) -> HashMap<String, bool> {
        let mut results = HashMap::new();

        for (name, handle) in &mut self.servers {
            if handle.state != ServerState::Running {
                results.insert(name.clone(), false);
                continue;
            }

            let client = handle.client.lock().await;
            match timeout(Duration::from_secs(5), client.ping()).await {
                Ok(Ok(())) => {
                    debug!(
                        server = %name,
                        reports = client.server_info().map(|i| i.name.as_str()).unwrap_or("unknown"),
                        "MCP server responsive"
                    );
                    results.insert(name.clone(), true);
                }
                Ok(Err(e)) => {
                    warn!(server = %name, error = %e, "MCP health check failed");
                    handle.state = ServerState::Failed(e.to_string());
                    results.insert(name.clone(), false);
                }
                Err(_) => {
                    warn!(server = %name, "MCP health check timed out");
                    handle.state = ServerState::Failed("health check timed out".to_string());
                    results.insert(name.clone(), false);
                }
            }
        }

        results
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for McpManager {
    fn drop(&mut self) {
        // Child processes die via kill_on_drop; no async cleanup here
        if !self.servers.is_empty() {
            debug!(count = self.servers.len(), "McpManager dropped with live servers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::client::MCP_PROTOCOL_VERSION;
    use super::super::transport::{JsonRpcRequest, JsonRpcResponse, McpTransport};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Transport whose server answers initialize but may drop pings
    struct FlakyTransport {
        fail_pings: bool,
    }

    #[async_trait]
    impl McpTransport for FlakyTransport {
        async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
            let result = if request.method == "initialize" {
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "stub-server"}
                })
            } else if self.fail_pings {
                bail!("connection reset")
            } else {
                json!({})
            };

            Ok(serde_json::from_value(json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "result": result
            }))?)
        }

        async fn send_notification(&self, _method: &str, _params: Option<Value>) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    async fn running_handle(fail_pings: bool) -> ServerHandle {
        let mut client = McpClient::new(Box::new(FlakyTransport { fail_pings }));
        client.initialize().await.unwrap();
        ServerHandle {
            client: Arc::new(Mutex::new(client)),
            state: ServerState::Running,
        }
    }

    #[tokio::test]
    async fn test_health_check_marks_unresponsive_server_failed() {
        let mut manager = McpManager::new();
        manager.servers.insert("good".to_string(), running_handle(false).await);
        manager.servers.insert("bad".to_string(), running_handle(true).await);

        let health = manager.health_check().await;

        assert_eq!(health.get("good"), Some(&true));
        assert_eq!(health.get("bad"), Some(&false));
        assert_eq!(manager.server_state("good"), Some(&ServerState::Running));
        assert!(matches!(
            manager.server_state("bad"),
            Some(ServerState::Failed(_))
        ));
        assert_eq!(manager.running_servers(), vec!["good"]);
    }

    #[tokio::test]
    async fn test_health_check_reports_stopped_server_unhealthy() {
        let mut manager = McpManager::new();
        let mut handle = running_handle(false).await;
        handle.state = ServerState::Stopped;
        manager.servers.insert("idle".to_string(), handle);

        let health = manager.health_check().await;

        assert_eq!(health.get("idle"), Some(&false));
        assert_eq!(manager.server_state("idle"), Some(&ServerState::Stopped));
    }

    #[tokio::test]
    async fn test_manager_starts_empty() {
        let manager = McpManager::new();
        assert!(manager.running_servers().is_empty());
        assert!(manager.server_state("missing").is_none());
    }

    #[tokio::test]
    async fn test_start_server_bad_command_fails() {
        let mut manager = McpManager::new();
        let config = McpServerConfig::new("bogus", "/nonexistent/mcp-server-binary");

        assert!(manager.start_server(config).await.is_err());
        assert!(manager.running_servers().is_empty());
    }

    #[tokio::test]
    async fn test_start_all_collects_failures() {
        let mut manager = McpManager::new();
        let configs = vec![
            McpServerConfig::new("bogus", "/nonexistent/mcp-server-binary"),
        ];

        let failures = manager.start_all(configs).await;
        assert_eq!(failures, vec!["bogus".to_string()]);
    }

    #[test]
    fn test_server_state_equality() {
        assert_eq!(ServerState::Running, ServerState::Running);
        assert_ne!(ServerState::Running, ServerState::Stopped);
    }
}
