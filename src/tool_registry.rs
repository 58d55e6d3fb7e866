//! Permissioned tool registry.
//!
//! Mirrors the teacher's `tool_protocol.rs` dispatch shape — `Arc<dyn Tool>`
//! entries keyed by name, a read-lock-then-drop-before-await pattern around
//! every async dispatch — generalized to a four-level permission lattice
//! and an append-only execution log.

use crate::error::{McpError, McpResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// Permission lattice a tool is registered under.
///
/// `Public < Restricted < Supervised < Admin`. Only `Public` is available to
/// every agent; every other level requires an explicit grant via
/// [`ToolRegistry::grant`] (by convention `Admin` tools are never granted at
/// runtime — see §4.5 of the design doc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPermissionLevel {
    Public,
    Restricted,
    Supervised,
    Admin,
}

/// A registered tool: metadata plus the callable behind it.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn permission_level(&self) -> ToolPermissionLevel;
    /// JSON-schema-shaped parameter description, returned verbatim to callers.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run the tool. Implementations should return a JSON object; non-object
    /// results are wrapped by the registry before being handed back.
    async fn call(&self, params: serde_json::Value) -> McpResult<serde_json::Value>;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionLogEntry {
    pub tool_name: String,
    pub agent_id: String,
    pub success: bool,
    pub execution_time_secs: f64,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Registry of callable tools with per-agent permission grants.
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
    agent_permissions: DashMap<String, Vec<String>>,
    tool_usage: DashMap<String, u64>,
    execution_history: tokio::sync::Mutex<Vec<ExecutionLogEntry>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
            agent_permissions: DashMap::new(),
            tool_usage: DashMap::new(),
            execution_history: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Insert a tool, overwriting and logging if the name already exists.
    pub fn register_tool(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            log::warn!("tool {name} re-registered, overwriting previous entry");
        }
        self.tools.insert(name, tool);
    }

    /// Grant an agent access to the named tools. Unknown tool names are
    /// logged and skipped rather than rejected outright.
    pub fn grant(&self, agent_id: &str, tool_names: &[&str]) {
        let mut entry = self.agent_permissions.entry(agent_id.to_string()).or_default();
        for name in tool_names {
            if !self.tools.contains_key(*name) {
                log::warn!("cannot grant unknown tool {name} to {agent_id}");
                continue;
            }
            if !entry.iter().any(|t| t == name) {
                entry.push(name.to_string());
            }
        }
        log::info!("granted {agent_id} access to {} tools", tool_names.len());
    }

    pub fn revoke(&self, agent_id: &str, tool_names: &[&str]) {
        if let Some(mut entry) = self.agent_permissions.get_mut(agent_id) {
            entry.retain(|t| !tool_names.contains(&t.as_str()));
        }
        log::info!("revoked {agent_id} access to {} tools", tool_names.len());
    }

    fn has_permission(&self, agent_id: &str, tool_name: &str, level: ToolPermissionLevel) -> bool {
        if level == ToolPermissionLevel::Public {
            return true;
        }
        self.agent_permissions
            .get(agent_id)
            .map(|granted| granted.iter().any(|t| t == tool_name))
            .unwrap_or(false)
    }

    /// Union of public tools, tools explicitly granted to `agent_id`, and any
    /// tool named in `requested` that exists in the registry.
    pub fn tools_for_agent(&self, agent_id: &str, requested: Option<&[String]>) -> Vec<String> {
        let granted = self.agent_permissions.get(agent_id);
        self.tools
            .iter()
            .filter_map(|entry| {
                let name = entry.key();
                let tool = entry.value();
                let is_public = tool.permission_level() == ToolPermissionLevel::Public;
                let is_granted = granted.as_ref().map(|g| g.iter().any(|t| t == name)).unwrap_or(false);
                let is_requested = requested.map(|r| r.iter().any(|t| t == name)).unwrap_or(false);
                if is_public || is_granted || is_requested {
                    Some(name.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Run a tool by name, enforcing permissions and recording the outcome.
    ///
    /// Lock discipline: the tool `Arc` is cloned out of the map and the map
    /// guard dropped before the `await`, so no suspension point holds the
    /// registry's internal lock.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        params: serde_json::Value,
        agent_id: &str,
    ) -> serde_json::Value {
        let tool = match self.tools.get(tool_name).map(|e| Arc::clone(e.value())) {
            Some(tool) => tool,
            None => {
                return serde_json::json!({
                    "success": false,
                    "error": format!("tool {tool_name} not found"),
                });
            }
        };

        if !self.has_permission(agent_id, tool_name, tool.permission_level()) {
            return serde_json::json!({
                "success": false,
                "error": format!("agent {agent_id} lacks permission for tool {tool_name}"),
            });
        }

        let params = coerce_params(params);

        let started = Instant::now();
        let timestamp = Utc::now();
        let outcome = tool.call(params).await;
        let execution_time_secs = started.elapsed().as_secs_f64();

        self.tool_usage.entry(tool_name.to_string()).and_modify(|n| *n += 1).or_insert(1);

        match outcome {
            Ok(result) => {
                self.execution_history.lock().await.push(ExecutionLogEntry {
                    tool_name: tool_name.to_string(),
                    agent_id: agent_id.to_string(),
                    success: true,
                    execution_time_secs,
                    error: None,
                    timestamp,
                });

                let mut result = coerce_result(result);
                if let serde_json::Value::Object(ref mut map) = result {
                    map.insert("success".to_string(), serde_json::json!(true));
                    map.insert("execution_time".to_string(), serde_json::json!(execution_time_secs));
                }
                result
            }
            Err(e) => {
                self.execution_history.lock().await.push(ExecutionLogEntry {
                    tool_name: tool_name.to_string(),
                    agent_id: agent_id.to_string(),
                    success: false,
                    execution_time_secs,
                    error: Some(e.message().to_string()),
                    timestamp,
                });
                serde_json::json!({
                    "success": false,
                    "error": e.message(),
                })
            }
        }
    }

    pub async fn execution_history(&self) -> Vec<ExecutionLogEntry> {
        self.execution_history.lock().await.clone()
    }
}

/// Accept either an already-decoded object or a JSON string; on decode
/// failure, wrap the raw string rather than rejecting the call outright.
fn coerce_params(params: serde_json::Value) -> serde_json::Value {
    match params {
        serde_json::Value::String(raw) => {
            serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({"input": raw}))
        }
        serde_json::Value::Null => serde_json::json!({}),
        other => other,
    }
}

fn coerce_result(result: serde_json::Value) -> serde_json::Value {
    match result {
        serde_json::Value::Object(_) => result,
        other => serde_json::json!({"output": other.to_string()}),
    }
}

/// Register the tool call error type so callers can build a `Tool` whose
/// `call` surfaces an `McpError` rather than panicking.
pub type ToolResult = McpResult<serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        level: ToolPermissionLevel,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn permission_level(&self) -> ToolPermissionLevel {
            self.level
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, params: serde_json::Value) -> ToolResult {
            Ok(serde_json::json!({"echoed": params}))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn permission_level(&self) -> ToolPermissionLevel {
            ToolPermissionLevel::Public
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _params: serde_json::Value) -> ToolResult {
            Err(McpError::InternalError("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn public_tool_is_callable_without_grant() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(EchoTool { level: ToolPermissionLevel::Public }));
        let result = registry.execute_tool("echo", serde_json::json!({"a": 1}), "agent-1").await;
        assert_eq!(result["success"], true);
    }

    #[tokio::test]
    async fn restricted_tool_requires_grant() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(EchoTool { level: ToolPermissionLevel::Restricted }));

        let denied = registry.execute_tool("echo", serde_json::json!({}), "agent-1").await;
        assert_eq!(denied["success"], false);

        registry.grant("agent-1", &["echo"]);
        let allowed = registry.execute_tool("echo", serde_json::json!({}), "agent-1").await;
        assert_eq!(allowed["success"], true);
    }

    #[tokio::test]
    async fn revoke_removes_access() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(EchoTool { level: ToolPermissionLevel::Restricted }));
        registry.grant("agent-1", &["echo"]);
        registry.revoke("agent-1", &["echo"]);
        let result = registry.execute_tool("echo", serde_json::json!({}), "agent-1").await;
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn unknown_tool_reports_not_found() {
        let registry = ToolRegistry::new();
        let result = registry.execute_tool("missing", serde_json::json!({}), "agent-1").await;
        assert_eq!(result["success"], false);
        assert!(result["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn failing_tool_is_recorded_in_execution_history() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(FailingTool));
        let result = registry.execute_tool("boom", serde_json::json!({}), "agent-1").await;
        assert_eq!(result["success"], false);

        let history = registry.execution_history().await;
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
    }

    #[tokio::test]
    async fn tools_for_agent_includes_public_and_granted() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(EchoTool { level: ToolPermissionLevel::Public }));
        registry.register_tool(Arc::new(FailingTool));
        registry.grant("agent-1", &["boom"]);

        let tools = registry.tools_for_agent("agent-1", None);
        assert!(tools.contains(&"echo".to_string()));
        assert!(tools.contains(&"boom".to_string()));
    }

    #[tokio::test]
    async fn string_params_are_parsed_as_json() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(EchoTool { level: ToolPermissionLevel::Public }));
        let result = registry
            .execute_tool("echo", serde_json::json!("{\"a\": 1}"), "agent-1")
            .await;
        assert_eq!(result["echoed"]["a"], 1);
    }

    #[tokio::test]
    async fn unparseable_string_params_are_wrapped() {
        let registry = ToolRegistry::new();
        registry.register_tool(Arc::new(EchoTool { level: ToolPermissionLevel::Public }));
        let result = registry.execute_tool("echo", serde_json::json!("not json"), "agent-1").await;
        assert_eq!(result["echoed"]["input"], "not json");
    }
}
