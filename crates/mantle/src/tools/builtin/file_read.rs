//! File read tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::tools::{
    ParameterProperty, ParameterSchema, Tool, ToolCategory, ToolContext, ToolResult,
};

use super::{clip_output, ensure_allowed, resolve_path};

/// Tool for reading file contents
pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Returns numbered lines; binary files return an error."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::File
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required(
                "path",
                ParameterProperty::string(
                    "The path to the file to read (absolute or relative to the working directory)",
                ),
            )
            .with_property(
                "offset",
                ParameterProperty::number("Line number to start reading from (1-indexed, default: 1)")
                    .with_default(Value::Number(1.into())),
            )
            .with_property(
                "limit",
                ParameterProperty::number("Maximum number of lines to read (default: unlimited)"),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolResult> {
        let path_str = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: path"))?;

        let offset = args
            .get("offset")
            .and_then(|v| v.as_u64())
            .map(|v| v.saturating_sub(1) as usize)
            .unwrap_or(0);

        let limit = args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let path = resolve_path(path_str, ctx);
        ensure_allowed(&path, ctx)?;

        if !path.exists() {
            return Ok(ToolResult::error(format!("File not found: {}", path.display())));
        }
        if !path.is_file() {
            return Ok(ToolResult::error(format!("Not a file: {}", path.display())));
        }

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolResult::error(format!("Failed to read file: {}", e)));
            }
        };

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let selected: Vec<_> = lines
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(i, line)| format!("{:>6}\t{}", offset + i + 1, line))
            .collect();

        let output = if selected.is_empty() {
            format!(
                "File is empty or offset {} exceeds file length ({} lines)",
                offset + 1,
                total_lines
            )
        } else {
            let header = format!("File: {} ({} lines total)\n", path.display(), total_lines);
            header + &selected.join("\n")
        };

        Ok(ToolResult::success(clip_output(output, ctx.max_output_len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    fn ctx() -> ToolContext {
        ToolContext::new(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_read_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "line 1").unwrap();
        writeln!(temp, "line 2").unwrap();
        writeln!(temp, "line 3").unwrap();

        let args = json!({ "path": temp.path().to_str().unwrap() });
        let result = FileReadTool.execute(&args, &ctx()).await.unwrap();

        assert!(result.success);
        assert!(result.output.contains("line 1"));
        assert!(result.output.contains("line 3"));
    }

    #[tokio::test]
    async fn test_read_file_with_offset_limit() {
        let mut temp = NamedTempFile::new().unwrap();
        for i in 1..=10 {
            writeln!(temp, "line {}", i).unwrap();
        }

        let args = json!({
            "path": temp.path().to_str().unwrap(),
            "offset": 3,
            "limit": 2
        });
        let result = FileReadTool.execute(&args, &ctx()).await.unwrap();

        assert!(result.success);
        assert!(result.output.contains("line 3"));
        assert!(result.output.contains("line 4"));
        assert!(!result.output.contains("line 5"));
    }

    #[tokio::test]
    async fn test_read_nonexistent_file() {
        let args = json!({ "path": "/nonexistent/path/file.txt" });
        let result = FileReadTool.execute(&args, &ctx()).await.unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[tokio::test]
    async fn test_read_outside_allow_list_is_denied() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "secret").unwrap();

        let ctx = ctx().with_allowed_paths(vec![dir.path().to_path_buf()]);
        let args = json!({ "path": temp.path().to_str().unwrap() });

        let err = FileReadTool.execute(&args, &ctx).await.unwrap_err();
        assert!(err
            .downcast_ref::<crate::tools::ToolError>()
            .is_some());
    }
}
