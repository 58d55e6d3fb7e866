//! MCP message schema and validator.
//!
//! This is the wire contract between the orchestrator and worker bridges:
//! the `Message` envelope, its `Context` and `DeliveryOptions`, the
//! task-request/response pair, and the closed enums that make the wire
//! format interoperable across language boundaries.
//!
//! # Example
//!
//! ```
//! use agentbus::schema::{Message, MessageType, Context, DeliveryOptions, validate_message};
//!
//! let msg = Message::new(
//!     "orchestrator",
//!     "worker-1",
//!     MessageType::Heartbeat,
//!     serde_json::json!({"status": "healthy"}),
//!     Context::new("req-1", 30_000),
//!     DeliveryOptions::default(),
//! );
//!
//! let raw = serde_json::to_value(&msg).unwrap();
//! let parsed = validate_message(&raw).unwrap();
//! assert_eq!(parsed.id, msg.id);
//! ```

use crate::error::{McpError, McpResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Closed set of message types carried on the wire.
///
/// The first block is validated as a typed payload by [`validate_message`].
/// The control types after it are exchanged by the bridge/transport layer
/// but are intentionally not payload-validated (§4.1): their shape is
/// bridge-internal and varies by the control exchange in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TaskRequest,
    TaskResponse,
    TaskProgress,
    TaskCancel,
    StreamStart,
    StreamData,
    StreamEnd,
    Heartbeat,
    HealthCheck,
    AgentRegister,
    AgentDeregister,
    SystemCommand,
    ConfigUpdate,
    EmergencyStop,

    // Control types, not payload-validated.
    Handshake,
    HeartbeatResponse,
    AgentQuery,
    AgentQueryResponse,
    StatusRequest,
    StatusResponse,
    Shutdown,
}

impl MessageType {
    /// Whether this type's payload is validated against a typed schema.
    pub fn is_core(self) -> bool {
        !matches!(
            self,
            MessageType::Handshake
                | MessageType::HeartbeatResponse
                | MessageType::AgentQuery
                | MessageType::AgentQueryResponse
                | MessageType::StatusRequest
                | MessageType::StatusResponse
                | MessageType::Shutdown
        )
    }
}

/// Delivery guarantee requested for a message.
///
/// Per the Non-goals in §1, only `AtMostOnce` and `AtLeastOnce` are
/// implemented; `ExactlyOnce` is declared for wire compatibility and is
/// rejected by [`DeliveryOptions::validate`] with `configuration-error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryGuarantee {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Terminal and intermediate task lifecycle states.
///
/// `Accepted` is a Rust-native addition (see the Open Questions resolution
/// in DESIGN.md): the bridge emits it as the acknowledgement state between
/// receiving a `task_request` and the first `Running` update, rather than
/// silently aliasing it to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Accepted,
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl TaskStatus {
    /// A terminal status is the last response the bridge will send for a task id.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Timeout
        )
    }
}

/// Role an agent plays within the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Orchestrator,
    Supervisor,
    SubAgent,
}

/// Per-model and aggregate spend tracking for a logical call chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostBudget {
    pub max_usd: f64,
    pub max_tokens: u64,
    pub used_usd: f64,
    pub used_tokens: u64,
    pub model_costs: HashMap<String, f64>,
}

impl CostBudget {
    /// `used <= max` once evaluated (§3 invariant).
    pub fn within_budget(&self) -> bool {
        self.used_usd <= self.max_usd && self.used_tokens <= self.max_tokens
    }
}

/// Resource ceilings attached to a request context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_cpu_percent: u8,
    pub max_memory_mb: u64,
    pub max_concurrent_requests: u32,
    pub max_processing_time_ms: u64,
}

/// Distributed-tracing hint and call-chain scoped metadata.
///
/// `trace_id`/`span_id`/`baggage` are opaque to the core (§3): they are
/// passed through verbatim and never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub baggage: HashMap<String, String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub workspace_id: Option<String>,
    pub request_id: String,
    pub timeout_ms: u64,
    pub metadata: HashMap<String, String>,
    pub budget: Option<CostBudget>,
    pub limits: Option<ResourceLimits>,
}

impl Context {
    /// Build a minimal context with a fresh trace/span id pair.
    pub fn new(request_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            baggage: HashMap::new(),
            user_id: None,
            session_id: None,
            workspace_id: None,
            request_id: request_id.into(),
            timeout_ms,
            metadata: HashMap::new(),
            budget: None,
            limits: None,
        }
    }
}

/// Delivery semantics requested for a single message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOptions {
    pub guarantee: DeliveryGuarantee,
    pub retry_count: u8,
    pub retry_delay_ms: u64,
    pub require_ack: bool,
    pub priority: u8,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            guarantee: DeliveryGuarantee::AtMostOnce,
            retry_count: 0,
            retry_delay_ms: 0,
            require_ack: false,
            priority: 5,
        }
    }
}

impl DeliveryOptions {
    /// Reject out-of-range fields and the unsupported `ExactlyOnce` guarantee.
    pub fn validate(&self) -> McpResult<()> {
        if self.retry_count > 10 {
            return Err(McpError::InvalidMessageFormat(format!(
                "retry_count {} exceeds maximum of 10",
                self.retry_count
            )));
        }
        if self.priority > 10 {
            return Err(McpError::InvalidMessageFormat(format!(
                "priority {} exceeds maximum of 10",
                self.priority
            )));
        }
        if self.guarantee == DeliveryGuarantee::ExactlyOnce {
            return Err(McpError::ConfigurationError(
                "exactly-once delivery is not implemented".to_string(),
            ));
        }
        Ok(())
    }
}

/// The wire envelope exchanged between orchestrator and bridges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub correlation_id: Option<Uuid>,
    pub trace_id: String,
    pub span_id: String,
    pub sender: String,
    pub recipient: String,
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    pub context: Context,
    pub delivery: DeliveryOptions,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub security_token: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Message {
    /// Construct a new message with a fresh id and the current timestamp.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        message_type: MessageType,
        payload: serde_json::Value,
        context: Context,
        delivery: DeliveryOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id: None,
            trace_id: context.trace_id.clone(),
            span_id: context.span_id.clone(),
            sender: sender.into(),
            recipient: recipient.into(),
            message_type,
            payload,
            tags: Vec::new(),
            context,
            delivery,
            created_at: Utc::now(),
            expires_at: None,
            security_token: None,
            permissions: Vec::new(),
        }
    }

    /// Build a reply that correlates back to this message, swapping sender/recipient.
    pub fn reply(
        &self,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Self {
        let mut reply = Message::new(
            self.recipient.clone(),
            self.sender.clone(),
            message_type,
            payload,
            self.context.clone(),
            self.delivery.clone(),
        );
        reply.correlation_id = Some(self.id);
        reply.trace_id = self.trace_id.clone();
        reply.span_id = self.span_id.clone();
        reply
    }
}

/// Validate a raw JSON value as a [`Message`], rejecting malformed or
/// out-of-range fields without panicking.
pub fn validate_message(raw: &serde_json::Value) -> McpResult<Message> {
    let message: Message = serde_json::from_value(raw.clone())
        .map_err(|e| McpError::InvalidMessageFormat(e.to_string()))?;
    message.delivery.validate()?;
    Ok(message)
}

/// Processing/queueing metrics attached to a terminal or progress response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub processing_ms: u64,
    pub queue_ms: u64,
    pub retry_count: u8,
    pub cost_usd: f64,
    pub tokens_used: u64,
    pub model_used: Option<String>,
    #[serde(default)]
    pub custom_metrics: HashMap<String, f64>,
}

/// A request to execute one unit of work, addressed by task type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_type: String,
    pub task_id: Uuid,
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub preferred_agent: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    pub deadline: Option<DateTime<Utc>>,
}

fn default_priority() -> u8 {
    5
}

impl TaskRequest {
    pub fn new(task_type: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            task_type: task_type.into(),
            task_id: Uuid::new_v4(),
            parameters,
            metadata: HashMap::new(),
            preferred_agent: None,
            priority: default_priority(),
            deadline: None,
        }
    }

    fn validate(&self) -> McpResult<()> {
        if self.priority > 10 {
            return Err(McpError::InvalidParameters(format!(
                "priority {} exceeds maximum of 10",
                self.priority
            )));
        }
        Ok(())
    }
}

/// Result of a completed, failed, or in-progress task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub error_code: Option<crate::error::ErrorCode>,
    pub metrics: TaskMetrics,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub agent: Option<String>,
}

impl TaskResponse {
    pub fn pending(task_id: Uuid) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            result: None,
            error_message: None,
            error_code: None,
            metrics: TaskMetrics::default(),
            warnings: Vec::new(),
            agent: None,
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn accepted(task_id: Uuid) -> Self {
        Self {
            status: TaskStatus::Accepted,
            ..Self::pending(task_id)
        }
    }

    pub fn running(task_id: Uuid) -> Self {
        Self {
            status: TaskStatus::Running,
            ..Self::pending(task_id)
        }
    }

    pub fn completed(task_id: Uuid, result: serde_json::Value, metrics: TaskMetrics) -> Self {
        Self {
            task_id,
            status: TaskStatus::Completed,
            result: Some(result),
            error_message: None,
            error_code: None,
            metrics,
            warnings: Vec::new(),
            agent: None,
        }
    }

    pub fn failed(task_id: Uuid, error: &McpError) -> Self {
        Self {
            task_id,
            status: TaskStatus::Failed,
            result: None,
            error_message: Some(error.message().to_string()),
            error_code: Some(error.code()),
            metrics: TaskMetrics::default(),
            warnings: Vec::new(),
            agent: None,
        }
    }

    pub fn timeout(task_id: Uuid) -> Self {
        Self {
            task_id,
            status: TaskStatus::Timeout,
            result: None,
            error_message: Some("task deadline exceeded".to_string()),
            error_code: Some(crate::error::ErrorCode::TaskTimeout),
            metrics: TaskMetrics::default(),
            agent: None,
            warnings: Vec::new(),
        }
    }
}

/// Health snapshot reported by a worker/bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub status_message: String,
    pub cpu_usage: f64,
    pub memory_mb: u64,
    pub active_tasks: u32,
    pub last_heartbeat: DateTime<Utc>,
}

/// Record announced by a bridge when it registers an agent with the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub agent_name: String,
    pub agent_type: AgentType,
    pub version: String,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub health: HealthStatus,
    pub registered_at: DateTime<Utc>,
}

/// Validate a raw JSON value as a [`TaskRequest`].
pub fn validate_task_request(raw: &serde_json::Value) -> McpResult<TaskRequest> {
    let request: TaskRequest = serde_json::from_value(raw.clone())
        .map_err(|e| McpError::InvalidParameters(e.to_string()))?;
    request.validate()?;
    Ok(request)
}

/// Validate a raw JSON value as a [`TaskResponse`].
pub fn validate_task_response(raw: &serde_json::Value) -> McpResult<TaskResponse> {
    serde_json::from_value(raw.clone()).map_err(|e| McpError::InvalidMessageFormat(e.to_string()))
}

/// Dotted-namespace task types known to the validator.
///
/// Grounded on the original system's `TaskTypes` catalogue: the bridge may
/// still accept task types outside this list, responding `InvalidTaskType`
/// only when no registered agent claims them.
pub const KNOWN_TASK_TYPES: &[&str] = &[
    "huggingface.text.generation",
    "huggingface.text.classification",
    "huggingface.text.summarization",
    "huggingface.text.translation",
    "huggingface.text.question_answering",
    "huggingface.vision.classification",
    "huggingface.vision.object_detection",
    "huggingface.vision.segmentation",
    "huggingface.audio.speech_recognition",
    "huggingface.audio.text_to_speech",
    "huggingface.multimodal.visual_qa",
    "langchain.agent.execute",
    "langchain.chat.execute",
    "langchain.react.execute",
    "langchain.generative.execute",
    "langchain.plan_execute",
    "langchain.babyagi.execute",
    "deepgram.audio.transcribe.live",
    "deepgram.audio.transcribe.file",
    "deepgram.audio.agent.live",
    "system.health_check",
    "system.telemetry_query",
    "system.config_update",
    "lifeos.calendar.sync",
    "lifeos.email.process",
    "lifeos.contact.search",
    "security.audit",
    "security.vulnerability_scan",
    "security.compliance_check",
    "memory.knowledge_graph.upsert",
    "memory.knowledge_graph.query",
    "memory.context.retrieve",
    "memory.context.store",
    "research.web.search",
    "research.web.scrape",
    "writer.compose",
    "codewriter.generate",
    "analytics.run_query",
    "scheduler.schedule_event",
    "multimodal.fuse",
    "translation.detect_translate",
    "notification.send",
    "artist.generate_image",
    "design.create_mockup",
    "comedian.generate_joke",
];

/// Whether `task_type` is in the known catalogue (case-sensitive, exact match).
pub fn is_valid_task_type(task_type: &str) -> bool {
    KNOWN_TASK_TYPES.contains(&task_type)
}

/// Fixed map of supervisor name to the capabilities it owns.
///
/// `intelligence` is the default fallback for any task type not listed
/// under `multimodal` or `system`.
pub fn supervisor_for_task(task_type: &str) -> &'static str {
    const MULTIMODAL: &[&str] = &[
        "huggingface.vision.classification",
        "huggingface.audio.speech_recognition",
        "deepgram.audio.transcribe.live",
        "deepgram.audio.agent.live",
        "multimodal.fuse",
        "artist.generate_image",
    ];
    const SYSTEM: &[&str] = &[
        "system.health_check",
        "system.telemetry_query",
        "lifeos.calendar.sync",
        "security.audit",
        "memory.knowledge_graph.query",
        "notification.send",
    ];

    if MULTIMODAL.contains(&task_type) {
        "multimodal"
    } else if SYSTEM.contains(&task_type) {
        "system"
    } else {
        "intelligence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> Message {
        Message::new(
            "orchestrator",
            "worker-1",
            MessageType::TaskRequest,
            serde_json::json!({"hello": "world"}),
            Context::new("req-1", 5_000),
            DeliveryOptions::default(),
        )
    }

    #[test]
    fn round_trips_through_json() {
        let msg = sample_message();
        let raw = serde_json::to_value(&msg).unwrap();
        let parsed = validate_message(&raw).unwrap();
        assert_eq!(parsed.id, msg.id);
        assert_eq!(parsed.sender, msg.sender);
        assert_eq!(parsed.context.request_id, msg.context.request_id);
    }

    #[test]
    fn rejects_unknown_message_type() {
        let mut raw = serde_json::to_value(sample_message()).unwrap();
        raw["message_type"] = serde_json::json!("not_a_real_type");
        assert!(validate_message(&raw).is_err());
    }

    #[test]
    fn rejects_priority_above_ten() {
        let mut raw = serde_json::to_value(sample_message()).unwrap();
        raw["delivery"]["priority"] = serde_json::json!(11);
        assert!(validate_message(&raw).is_err());
    }

    #[test]
    fn rejects_exactly_once_delivery() {
        let mut raw = serde_json::to_value(sample_message()).unwrap();
        raw["delivery"]["guarantee"] = serde_json::json!("exactly_once");
        let err = validate_message(&raw).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigurationError);
    }

    #[test]
    fn reply_correlates_and_swaps_addresses() {
        let msg = sample_message();
        let reply = msg.reply(MessageType::TaskResponse, serde_json::json!({}));
        assert_eq!(reply.correlation_id, Some(msg.id));
        assert_eq!(reply.sender, msg.recipient);
        assert_eq!(reply.recipient, msg.sender);
    }

    #[test]
    fn supervisor_defaults_to_intelligence() {
        assert_eq!(supervisor_for_task("writer.compose"), "intelligence");
        assert_eq!(supervisor_for_task("some.unknown.type"), "intelligence");
    }

    #[test]
    fn supervisor_maps_known_capabilities() {
        assert_eq!(supervisor_for_task("security.audit"), "system");
        assert_eq!(supervisor_for_task("multimodal.fuse"), "multimodal");
    }

    #[test]
    fn known_task_types_are_recognized() {
        assert!(is_valid_task_type("langchain.agent.execute"));
        assert!(!is_valid_task_type("bogus.task.type"));
    }

    #[test]
    fn task_response_terminal_states() {
        let id = Uuid::new_v4();
        assert!(TaskResponse::completed(id, serde_json::json!(null), TaskMetrics::default())
            .status
            .is_terminal());
        assert!(!TaskResponse::accepted(id).status.is_terminal());
        assert!(!TaskResponse::running(id).status.is_terminal());
    }
}
