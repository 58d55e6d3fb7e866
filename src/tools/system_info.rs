//! Public tool reporting host process/runtime information.

use crate::error::McpResult;
use crate::tool_registry::{Tool, ToolPermissionLevel};
use async_trait::async_trait;

pub struct SystemInfoTool;

impl SystemInfoTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemInfoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SystemInfoTool {
    fn name(&self) -> &str {
        "system_info"
    }

    fn description(&self) -> &str {
        "Report host OS, architecture, and process information"
    }

    fn permission_level(&self) -> ToolPermissionLevel {
        ToolPermissionLevel::Public
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _params: serde_json::Value) -> McpResult<serde_json::Value> {
        Ok(serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "family": std::env::consts::FAMILY,
            "pid": std::process::id(),
            "num_cpus": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }))
    }
}
