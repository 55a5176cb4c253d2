//! Web fetch tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::tools::{
    ParameterProperty, ParameterSchema, Tool, ToolCategory, ToolContext, ToolResult,
};

use super::clip_output;

/// Shared HTTP client for connection pooling. The dispatcher enforces
/// the network deadline; the client timeout is a backstop.
static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(60))
            .user_agent("mantle/0.1")
            .build()
            .unwrap_or_default()
    })
}

/// Tool for fetching web content
pub struct WebFetchTool;

impl WebFetchTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch content from an HTTP or HTTPS URL. JSON responses are pretty-printed; other content is returned as text."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Network
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("url", ParameterProperty::string("The URL to fetch"))
            .with_property(
                "raw",
                ParameterProperty::boolean("Return the body unmodified (default: false)"),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolResult> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: url"))?;

        let raw = args.get("raw").and_then(|v| v.as_bool()).unwrap_or(false);

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Ok(ToolResult::error("Only HTTP and HTTPS URLs are supported"));
        }

        debug!(url = %url.chars().take(100).collect::<String>(), "Sending HTTP request");

        let response = match shared_client().get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Failed to fetch URL");
                return Ok(ToolResult::error(format!("Failed to fetch URL: {}", e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::error(format!("HTTP error: {}", status)));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::error(format!("Failed to read response: {}", e))),
        };

        let output = if !raw && content_type.contains("application/json") {
            match serde_json::from_str::<Value>(&body) {
                Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(body),
                Err(_) => body,
            }
        } else {
            body
        };

        Ok(ToolResult::success(clip_output(output, ctx.max_output_len)))
    }
}
