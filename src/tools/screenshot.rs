//! Restricted tool capturing a screenshot via the configured automation backend.
//!
//! Ships wired to [`DisabledAutomationBackend`], so by default every call
//! reports `service_unavailable` rather than touching a real display.

use crate::collaborators::{AutomationBackend, DisabledAutomationBackend};
use crate::error::McpResult;
use crate::tool_registry::{Tool, ToolPermissionLevel};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;

pub struct ScreenshotTool {
    backend: Arc<dyn AutomationBackend>,
}

impl ScreenshotTool {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(DisabledAutomationBackend),
        }
    }

    pub fn with_backend(backend: Arc<dyn AutomationBackend>) -> Self {
        Self { backend }
    }
}

impl Default for ScreenshotTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &str {
        "screenshot"
    }

    fn description(&self) -> &str {
        "Capture a screenshot of the current display"
    }

    fn permission_level(&self) -> ToolPermissionLevel {
        ToolPermissionLevel::Restricted
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _params: serde_json::Value) -> McpResult<serde_json::Value> {
        let bytes = self.backend.screenshot().await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(serde_json::json!({"image_base64": encoded, "bytes": bytes.len()}))
    }
}
