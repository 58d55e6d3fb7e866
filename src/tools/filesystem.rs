//! Sandboxed file read/write tools.
//!
//! Restricted to `/tmp`, `/home`, and `/var/tmp` (§4.5 file-system safety):
//! any path that resolves outside those prefixes is rejected before the
//! underlying filesystem call, regardless of symlinks or `..` components.

use crate::error::{McpError, McpResult};
use crate::tool_registry::{Tool, ToolPermissionLevel};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const SAFE_DIRS: &[&str] = &["/tmp", "/home", "/var/tmp"];

fn ensure_safe(path: &Path) -> McpResult<PathBuf> {
    let resolved = if path.exists() {
        path.canonicalize()
            .map_err(|e| McpError::InvalidParameters(format!("cannot resolve path: {e}")))?
    } else {
        // A not-yet-existing write target: check its parent instead.
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let parent = if parent.exists() {
            parent
                .canonicalize()
                .map_err(|e| McpError::InvalidParameters(format!("cannot resolve path: {e}")))?
        } else {
            parent.to_path_buf()
        };
        parent.join(path.file_name().unwrap_or_default())
    };

    if !SAFE_DIRS.iter().any(|dir| resolved.starts_with(dir)) {
        return Err(McpError::AuthorizationFailed(
            "access denied: unsafe directory".to_string(),
        ));
    }
    Ok(resolved)
}

pub struct FileReadTool;

impl FileReadTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileReadTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file"
    }

    fn permission_level(&self) -> ToolPermissionLevel {
        ToolPermissionLevel::Restricted
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to file to read"}
            },
            "required": ["file_path"]
        })
    }

    async fn call(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let file_path = params
            .get("file_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| McpError::InvalidParameters("file_path is required".to_string()))?;

        let path = Path::new(file_path);
        if !path.exists() {
            return Ok(serde_json::json!({"error": format!("file not found: {file_path}")}));
        }
        if path.is_dir() {
            return Ok(serde_json::json!({"error": format!("path is a directory: {file_path}")}));
        }

        let resolved = ensure_safe(path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| McpError::InternalError(format!("read failed: {e}")))?;

        Ok(serde_json::json!({"file_path": file_path, "content": content}))
    }
}

pub struct FileWriteTool;

impl FileWriteTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file"
    }

    fn permission_level(&self) -> ToolPermissionLevel {
        ToolPermissionLevel::Restricted
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to file to write"},
                "content": {"type": "string", "description": "Content to write"}
            },
            "required": ["file_path", "content"]
        })
    }

    async fn call(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let file_path = params
            .get("file_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| McpError::InvalidParameters("file_path is required".to_string()))?;
        let content = params
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| McpError::InvalidParameters("content is required".to_string()))?;

        let path = Path::new(file_path);
        let resolved = ensure_safe(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| McpError::InternalError(format!("creating parent dirs failed: {e}")))?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| McpError::InternalError(format!("write failed: {e}")))?;

        Ok(serde_json::json!({"file_path": file_path, "bytes_written": content.len()}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        // tempdir() lives under /tmp, satisfying the safe-dir restriction.
        let path_str = path.to_str().unwrap().to_string();

        let writer = FileWriteTool::new();
        writer
            .call(serde_json::json!({"file_path": path_str, "content": "hello"}))
            .await
            .unwrap();

        let reader = FileReadTool::new();
        let result = reader.call(serde_json::json!({"file_path": path_str})).await.unwrap();
        assert_eq!(result["content"], "hello");
    }

    #[tokio::test]
    async fn rejects_paths_outside_safe_dirs() {
        let reader = FileReadTool::new();
        let result = reader
            .call(serde_json::json!({"file_path": "/etc/passwd"}))
            .await;
        assert!(result.is_err());
    }
}
