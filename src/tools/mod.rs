//! Core tool implementations registered by the orchestrator at startup.
//!
//! Each tool implements [`crate::tool_registry::Tool`] and is registered at
//! the permission level named in the design doc's core-tools table: public
//! (`web_search`, `system_info`), restricted (`file_read`, `file_write`,
//! `screenshot`), and supervised (`execute_code`).

mod execute_code;
mod filesystem;
mod screenshot;
mod system_info;
mod web_search;

pub use execute_code::ExecuteCodeTool;
pub use filesystem::{FileReadTool, FileWriteTool};
pub use screenshot::ScreenshotTool;
pub use system_info::SystemInfoTool;
pub use web_search::WebSearchTool;

use crate::tool_registry::ToolRegistry;
use std::sync::Arc;

/// Register the full set of core tools against a fresh registry.
pub fn register_core_tools(registry: &ToolRegistry) {
    registry.register_tool(Arc::new(WebSearchTool::new()));
    registry.register_tool(Arc::new(FileReadTool::new()));
    registry.register_tool(Arc::new(FileWriteTool::new()));
    registry.register_tool(Arc::new(ScreenshotTool::new()));
    registry.register_tool(Arc::new(SystemInfoTool::new()));
    registry.register_tool(Arc::new(ExecuteCodeTool::new()));
}
