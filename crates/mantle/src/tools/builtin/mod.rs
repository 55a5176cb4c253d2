//! Built-in tools shipped with the runtime

mod file_read;
mod file_write;
mod shell;
mod web_fetch;

pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use shell::ShellTool;
pub use web_fetch::WebFetchTool;

use std::path::{Path, PathBuf};

use super::registry::{RegistryError, ToolRegistry};
use super::{ToolContext, ToolError};

/// Create a registry with all built-in tools
pub fn create_default_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    registry.register(FileReadTool)?;
    registry.register(FileWriteTool)?;
    registry.register(ShellTool)?;
    registry.register(WebFetchTool::new())?;

    Ok(registry)
}

/// Resolve a path argument against the context working directory
pub(crate) fn resolve_path(path_str: &str, ctx: &ToolContext) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        ctx.working_dir.join(path)
    }
}

/// Enforce the context allow-list. `None` means unrestricted. Paths are
/// canonicalized when they exist so symlinks cannot step outside a root.
pub(crate) fn ensure_allowed(path: &Path, ctx: &ToolContext) -> Result<(), ToolError> {
    let Some(allowed) = &ctx.allowed_paths else {
        return Ok(());
    };

    let candidate = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let permitted = allowed.iter().any(|root| {
        let root = root.canonicalize().unwrap_or_else(|_| root.clone());
        candidate.starts_with(&root)
    });

    if permitted {
        Ok(())
    } else {
        Err(ToolError::PermissionDenied(format!(
            "path outside the allow-list: {}",
            path.display()
        )))
    }
}

/// Truncate output at a char boundary once it exceeds the context limit
pub(crate) fn clip_output(output: String, max_len: usize) -> String {
    if output.len() <= max_len {
        return output;
    }
    let safe_end = output
        .char_indices()
        .take_while(|(idx, _)| *idx < max_len)
        .last()
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(0);
    format!(
        "{}\n\n[Output truncated at {} characters]",
        &output[..safe_end],
        safe_end
    )
}
