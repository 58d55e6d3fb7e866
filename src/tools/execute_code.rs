//! Supervised code-execution tool: runs a snippet in a subprocess with a
//! bounded timeout, in a fresh temporary working directory.

use crate::error::{McpError, McpResult};
use crate::tool_registry::{Tool, ToolPermissionLevel};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Language-to-launcher mapping. Unknown languages fall back to `bash -c`.
fn launcher_for(language: &str) -> (&'static str, Vec<String>) {
    match language {
        "python" | "python3" => ("python3", vec!["-c".to_string()]),
        "node" | "javascript" => ("node", vec!["-e".to_string()]),
        _ => ("bash", vec!["-c".to_string()]),
    }
}

pub struct ExecuteCodeTool {
    timeout: Duration,
}

impl ExecuteCodeTool {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ExecuteCodeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute a code snippet in a sandboxed subprocess"
    }

    fn permission_level(&self) -> ToolPermissionLevel {
        ToolPermissionLevel::Supervised
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Code to execute"},
                "language": {"type": "string", "description": "python, node, or bash", "default": "bash"}
            },
            "required": ["code"]
        })
    }

    async fn call(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let code = params
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| McpError::InvalidParameters("code is required".to_string()))?;
        let language = params.get("language").and_then(|v| v.as_str()).unwrap_or("bash");

        let (program, mut args) = launcher_for(language);
        args.push(code.to_string());

        let work_dir = tempfile::tempdir()
            .map_err(|e| McpError::InternalError(format!("failed to create work dir: {e}")))?;

        let mut command = Command::new(program);
        command.args(&args).current_dir(work_dir.path());

        let output = tokio::time::timeout(self.timeout, command.output()).await;

        match output {
            Ok(Ok(output)) => Ok(serde_json::json!({
                "stdout": String::from_utf8_lossy(&output.stdout),
                "stderr": String::from_utf8_lossy(&output.stderr),
                "exit_code": output.status.code().unwrap_or(-1),
            })),
            Ok(Err(e)) => Err(McpError::InternalError(format!("failed to spawn {program}: {e}"))),
            Err(_) => Err(McpError::TaskTimeout(format!(
                "code execution exceeded {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}
