//! Shell command execution tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::tools::{
    ParameterProperty, ParameterSchema, Tool, ToolCategory, ToolContext, ToolResult,
};

use super::{clip_output, ensure_allowed};

/// Tool for executing shell commands
pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use for terminal commands, build tools, and system inspection."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::System
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required(
                "command",
                ParameterProperty::string("The shell command to execute"),
            )
            .with_property(
                "timeout",
                ParameterProperty::number("Timeout in seconds (default: 120)")
                    .with_default(Value::Number(120.into())),
            )
            .with_property(
                "working_dir",
                ParameterProperty::string(
                    "Working directory for the command (default: the context working directory)",
                ),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolResult> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: command"))?;

        let timeout_secs = args.get("timeout").and_then(|v| v.as_u64()).unwrap_or(120);

        let working_dir = args
            .get("working_dir")
            .and_then(|v| v.as_str())
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| ctx.working_dir.clone());

        if !working_dir.exists() {
            return Ok(ToolResult::error(format!(
                "Working directory does not exist: {}",
                working_dir.display()
            )));
        }
        ensure_allowed(&working_dir, ctx)?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = timeout(Duration::from_secs(timeout_secs), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let mut combined = String::new();
                if !stdout.is_empty() {
                    combined.push_str(&stdout);
                }
                if !stderr.is_empty() {
                    if !combined.is_empty() {
                        combined.push_str("\n--- stderr ---\n");
                    }
                    combined.push_str(&stderr);
                }

                let combined = clip_output(combined, ctx.max_output_len);

                if output.status.success() {
                    Ok(ToolResult::success(combined))
                } else {
                    let exit_code = output
                        .status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    Ok(ToolResult::failure(
                        combined,
                        format!("Command exited with code {}", exit_code),
                    ))
                }
            }
            Ok(Err(e)) => Ok(ToolResult::error(format!("Failed to execute command: {}", e))),
            Err(_) => Ok(ToolResult::error(format!(
                "Command timed out after {} seconds",
                timeout_secs
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn ctx() -> ToolContext {
        ToolContext::new(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_shell_echo() {
        let args = json!({ "command": "echo 'hello world'" });
        let result = ShellTool.execute(&args, &ctx()).await.unwrap();

        assert!(result.success);
        assert!(result.output.contains("hello world"));
    }

    #[tokio::test]
    async fn test_shell_runs_in_working_dir() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ctx().with_working_dir(temp_dir.path().to_path_buf());
        let args = json!({ "command": "pwd" });

        let result = ShellTool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);

        let expected = temp_dir.path().canonicalize().unwrap();
        assert!(
            result.output.contains(expected.to_str().unwrap())
                || result.output.contains(temp_dir.path().to_str().unwrap())
        );
    }

    #[tokio::test]
    async fn test_shell_failure_carries_exit_code() {
        let args = json!({ "command": "exit 3" });
        let result = ShellTool.execute(&args, &ctx()).await.unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("code 3"));
    }

    #[tokio::test]
    async fn test_shell_stderr_captured() {
        let args = json!({ "command": "echo 'error message' >&2" });
        let result = ShellTool.execute(&args, &ctx()).await.unwrap();

        assert!(result.output.contains("error message"));
    }

    #[tokio::test]
    async fn test_shell_command_timeout() {
        let args = json!({ "command": "sleep 10", "timeout": 1 });
        let result = ShellTool.execute(&args, &ctx()).await.unwrap();

        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_shell_working_dir_outside_allow_list() {
        let allowed = TempDir::new().unwrap();
        let forbidden = TempDir::new().unwrap();

        let ctx = ctx().with_allowed_paths(vec![allowed.path().to_path_buf()]);
        let args = json!({
            "command": "ls",
            "working_dir": forbidden.path().to_str().unwrap()
        });

        let err = ShellTool.execute(&args, &ctx).await.unwrap_err();
        assert!(err.downcast_ref::<crate::tools::ToolError>().is_some());
    }
}
