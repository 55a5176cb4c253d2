//! File write tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::tools::{
    ParameterProperty, ParameterSchema, Tool, ToolCategory, ToolContext, ToolResult,
};

use super::{ensure_allowed, resolve_path};

/// Tool for writing file contents
pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does. Creates parent directories as needed."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::File
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required(
                "path",
                ParameterProperty::string("The path to write to (absolute or relative)"),
            )
            .with_required(
                "content",
                ParameterProperty::string("The content to write to the file"),
            )
            .with_property(
                "append",
                ParameterProperty::boolean("Append to file instead of overwriting (default: false)"),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolResult> {
        let path_str = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: path"))?;

        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: content"))?;

        let append = args.get("append").and_then(|v| v.as_bool()).unwrap_or(false);

        let path = resolve_path(path_str, ctx);
        ensure_allowed(&path, ctx)?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent).await {
                    return Ok(ToolResult::error(format!(
                        "Failed to create directories: {}",
                        e
                    )));
                }
            }
        }

        let result = if append {
            match fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
            {
                Ok(mut f) => f.write_all(content.as_bytes()).await,
                Err(e) => Err(e),
            }
        } else {
            fs::write(&path, content).await
        };

        match result {
            Ok(()) => {
                let mode = if append { "appended to" } else { "written to" };
                Ok(ToolResult::success(format!(
                    "Successfully {} {} ({} bytes)",
                    mode,
                    path.display(),
                    content.len()
                )))
            }
            Err(e) => Ok(ToolResult::error(format!("Failed to write file: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_write_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");

        let ctx = ToolContext::new(Uuid::new_v4()).with_working_dir(temp_dir.path().to_path_buf());
        let args = json!({
            "path": file_path.to_str().unwrap(),
            "content": "Hello, World!"
        });

        let result = FileWriteTool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "Hello, World!");
    }

    #[tokio::test]
    async fn test_write_file_creates_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a/b/c/test.txt");

        let ctx = ToolContext::new(Uuid::new_v4()).with_working_dir(temp_dir.path().to_path_buf());
        let args = json!({
            "path": file_path.to_str().unwrap(),
            "content": "nested content"
        });

        let result = FileWriteTool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);
        assert!(file_path.exists());
    }

    #[tokio::test]
    async fn test_write_file_append() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("append.txt");
        std::fs::write(&file_path, "line1\n").unwrap();

        let ctx = ToolContext::new(Uuid::new_v4()).with_working_dir(temp_dir.path().to_path_buf());
        let args = json!({
            "path": file_path.to_str().unwrap(),
            "content": "line2\n",
            "append": true
        });

        let result = FileWriteTool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "line1\nline2\n");
    }

    #[tokio::test]
    async fn test_write_outside_allow_list_is_denied() {
        let allowed = TempDir::new().unwrap();
        let forbidden = TempDir::new().unwrap();

        let ctx = ToolContext::new(Uuid::new_v4())
            .with_allowed_paths(vec![allowed.path().to_path_buf()]);
        let args = json!({
            "path": forbidden.path().join("x.txt").to_str().unwrap(),
            "content": "nope"
        });

        let err = FileWriteTool.execute(&args, &ctx).await.unwrap_err();
        assert!(err.downcast_ref::<crate::tools::ToolError>().is_some());
        assert!(!forbidden.path().join("x.txt").exists());
    }
}
