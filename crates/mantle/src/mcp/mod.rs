//! MCP (Model Context Protocol) client support
//!
//! Integrates external tool servers over stdio JSON-RPC. Each configured
//! server is spawned as a child process, initialized, and its tools are
//! wrapped as [`ExternalTool`]s with server-prefixed names so they can
//! live in the same registry as the built-ins.

pub mod client;
pub mod config;
pub mod lifecycle;
pub mod tools;
pub mod transport;

pub use client::{McpClient, McpToolInfo};
pub use config::McpServerConfig;
pub use lifecycle::{McpManager, ServerState};
pub use tools::ExternalTool;
pub use transport::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpTransport, StdioTransport};
