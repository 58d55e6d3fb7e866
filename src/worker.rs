//! The `Worker` trait: the unit of work a bridge dispatches tasks to.

use crate::error::McpResult;
use crate::schema::TaskRequest;
use async_trait::async_trait;

/// Something capable of executing one or more task types.
///
/// A worker declares its capabilities as a flat list of task-type strings;
/// the bridge's capability index is built directly from this list, so a
/// worker only ever receives task types it has explicitly claimed.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Stable name used in registration, logs, and routing decisions.
    fn name(&self) -> &str;

    /// Task types this worker claims to handle.
    fn capabilities(&self) -> &[String];

    /// Run one task to completion, returning its result payload.
    ///
    /// Errors propagate as a terminal `failed` response; this method must
    /// not panic for ordinary failure modes (bad parameters, upstream
    /// errors) — those belong in the `Err` branch.
    async fn execute_task(&self, request: TaskRequest) -> McpResult<serde_json::Value>;
}
