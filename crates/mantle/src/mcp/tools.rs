//! External tool adapter
//!
//! Wraps tools reported by an MCP server as [`Tool`] implementations so
//! the dispatcher treats them like any built-in. Names are prefixed with
//! the server name to keep registries collision-free.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::tools::{
    ParameterProperty, ParameterSchema, Tool, ToolCategory, ToolContext, ToolResult,
};

use super::client::{CallToolResult, McpClient, McpToolInfo};

/// A tool served by an external MCP process
pub struct ExternalTool {
    server_name: String,
    tool_info: McpToolInfo,
    client: Arc<Mutex<McpClient>>,
    prefixed_name: String,
}

impl ExternalTool {
    pub fn new(
        server_name: impl Into<String>,
        tool_info: McpToolInfo,
        client: Arc<Mutex<McpClient>>,
    ) -> Self {
        let server_name = server_name.into();
        let prefixed_name = format!("{}_{}", server_name, tool_info.name);
        Self {
            server_name,
            tool_info,
            client,
            prefixed_name,
        }
    }

    /// The server-side (unprefixed) tool name
    pub fn original_name(&self) -> &str {
        &self.tool_info.name
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Convert the server's JSON Schema into a [`ParameterSchema`]
    fn convert_schema(&self) -> ParameterSchema {
        let mut schema = ParameterSchema::new();

        if let Some(props) = self
            .tool_info
            .input_schema
            .get("properties")
            .and_then(|p| p.as_object())
        {
            for (name, prop_value) in props {
                schema
                    .properties
                    .insert(name.clone(), convert_property(prop_value));
            }
        }

        if let Some(required) = self
            .tool_info
            .input_schema
            .get("required")
            .and_then(|r| r.as_array())
        {
            schema.required = required
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect();
        }

        schema
    }
}

fn convert_property(value: &Value) -> ParameterProperty {
    let mut prop = ParameterProperty {
        param_type: value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("string")
            .to_string(),
        description: value
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("")
            .to_string(),
        enum_values: None,
        default: None,
    };

    if let Some(arr) = value.get("enum").and_then(|e| e.as_array()) {
        prop.enum_values = Some(
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        );
    }
    if let Some(default) = value.get("default") {
        prop.default = Some(default.clone());
    }

    prop
}

fn to_tool_result(result: CallToolResult) -> ToolResult {
    let output = result
        .content
        .iter()
        .filter_map(|c| match c.content_type.as_str() {
            "text" => c.text.clone(),
            "image" => Some("[Image data]".to_string()),
            _ => c.text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error {
        ToolResult::error(output)
    } else {
        ToolResult::success(output)
    }
}

#[async_trait]
impl Tool for ExternalTool {
    fn name(&self) -> &str {
        &self.prefixed_name
    }

    fn description(&self) -> &str {
        self.tool_info.description.as_deref().unwrap_or("MCP tool")
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::External
    }

    fn parameters_schema(&self) -> ParameterSchema {
        self.convert_schema()
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let client = self.client.lock().await;

        // The server knows the tool by its original name
        let result = client.call_tool(&self.tool_info.name, args.clone()).await?;

        Ok(to_tool_result(result))
    }
}
