//! MCP client
//!
//! Speaks the Model Context Protocol over a transport: initialize
//! handshake, cursor-paged tool listing, and tool calls.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::transport::{JsonRpcRequest, McpTransport};

/// MCP protocol version
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize)]
struct ClientInfo {
    name: String,
    version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "mantle".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Server capabilities returned during initialization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<Value>,
}

/// Server info returned during initialization
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Initialize result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

/// Tool definition reported by the server
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsResult {
    tools: Vec<McpToolInfo>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// One content block in a tool call result
#[derive(Debug, Clone, Deserialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Tool call result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(default)]
    pub is_error: bool,
}

pub struct McpClient {
    transport: Arc<Mutex<Box<dyn McpTransport>>>,
    request_id: AtomicU64,
    server_info: Option<ServerInfo>,
    initialized: bool,
}

impl McpClient {
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            request_id: AtomicU64::new(1),
            server_info: None,
            initialized: false,
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let request = JsonRpcRequest::new(self.next_id(), method, params);

        let transport = self.transport.lock().await;
        let response = transport.send_request(request).await?;

        if let Some(error) = response.error {
            bail!("MCP error: {}", error);
        }

        let result = response.result.context("MCP response missing result")?;
        serde_json::from_value(result).context("Failed to parse MCP result")
    }

    /// Run the initialize handshake and send the initialized notification
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let params = serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": ClientInfo::default()
        });

        let result: InitializeResult = self
            .request("initialize", Some(params))
            .await
            .context("Failed to initialize MCP connection")?;

        {
            let transport = self.transport.lock().await;
            transport
                .send_notification("notifications/initialized", None)
                .await?;
        }

        self.server_info = Some(result.server_info.clone());
        self.initialized = true;

        Ok(result)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// List all tools, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>> {
        if !self.initialized {
            bail!("MCP client not initialized");
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));

            let result: ListToolsResult = self
                .request("tools/list", params)
                .await
                .context("Failed to list MCP tools")?;

            tools.extend(result.tools);

            if result.next_cursor.is_none() {
                break;
            }
            cursor = result.next_cursor;
        }

        Ok(tools)
    }

    /// Call a tool by its server-side (unprefixed) name
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        if !self.initialized {
            bail!("MCP client not initialized");
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        self.request("tools/call", Some(params))
            .await
            .with_context(|| format!("Failed to call MCP tool: {}", name))
    }

    /// Ping the server
    pub async fn ping(&self) -> Result<()> {
        if !self.initialized {
            bail!("MCP client not initialized");
        }

        let _: Value = self.request("ping", None).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    /// Transport that replays canned responses and records requests
    struct CannedTransport {
        responses: SyncMutex<std::collections::VecDeque<Value>>,
        requests: SyncMutex<Vec<(String, Option<Value>)>>,
    }

    impl CannedTransport {
        fn new(responses: Vec<Value>) -> Self {
            Self {
                responses: SyncMutex::new(responses.into()),
                requests: SyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl McpTransport for CannedTransport {
        async fn send_request(
            &self,
            request: JsonRpcRequest,
        ) -> Result<super::super::transport::JsonRpcResponse> {
            self.requests
                .lock()
                .push((request.method.clone(), request.params.clone()));
            let mut result = self
                .responses
                .lock()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no canned response"))?;
            if let Some(obj) = result.as_object_mut() {
                obj.insert("id".to_string(), serde_json::json!(request.id));
            }
            Ok(serde_json::from_value(result)?)
        }

        async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
            self.requests.lock().push((method.to_string(), params));
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn init_response() -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "result": {
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "fake-server", "version": "1.0"}
            }
        })
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let mut client = McpClient::new(Box::new(CannedTransport::new(vec![init_response()])));

        let result = client.initialize().await.unwrap();
        assert_eq!(result.server_info.name, "fake-server");
        assert!(client.is_initialized());
        assert_eq!(client.server_info().map(|i| i.name.as_str()), Some("fake-server"));
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let page1 = serde_json::json!({
            "jsonrpc": "2.0",
            "result": {
                "tools": [{"name": "alpha", "inputSchema": {}}],
                "nextCursor": "page2"
            }
        });
        let page2 = serde_json::json!({
            "jsonrpc": "2.0",
            "result": {
                "tools": [{"name": "beta", "inputSchema": {}}]
            }
        });

        let mut client = McpClient::new(Box::new(CannedTransport::new(vec![
            init_response(),
            page1,
            page2,
        ])));
        client.initialize().await.unwrap();

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "alpha");
        assert_eq!(tools[1].name, "beta");
    }

    #[tokio::test]
    async fn test_uninitialized_calls_rejected() {
        let client = McpClient::new(Box::new(CannedTransport::new(vec![])));
        assert!(client.list_tools().await.is_err());
        assert!(client.call_tool("x", serde_json::json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_server_error_surfaces() {
        let error_response = serde_json::json!({
            "jsonrpc": "2.0",
            "result": null,
            "error": {"code": -32601, "message": "method not found"}
        });

        let mut client = McpClient::new(Box::new(CannedTransport::new(vec![
            init_response(),
            error_response,
        ])));
        client.initialize().await.unwrap();

        let err = client.call_tool("missing", serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
