//! Integration tests exercising the wire schema's public validation entry
//! points the way a transport layer actually calls them: starting from raw
//! `serde_json::Value`s, not pre-built typed structs.

use agentbus::schema::{
    is_valid_task_type, supervisor_for_task, validate_message, validate_task_request,
    validate_task_response, AgentRegistration, AgentType, Context, DeliveryOptions, HealthStatus,
    Message, MessageType, TaskMetrics, TaskResponse, TaskStatus,
};
use chrono::Utc;

#[test]
fn validates_a_task_request_message_round_tripped_through_json() {
    let msg = Message::new(
        "orchestrator",
        "research_agent",
        MessageType::TaskRequest,
        serde_json::json!({
            "task_type": "research.web.search",
            "task_id": uuid::Uuid::new_v4(),
            "parameters": {"query": "rust async traits"},
            "priority": 3,
        }),
        Context::new("req-42", 15_000),
        DeliveryOptions::default(),
    );

    let raw = serde_json::to_value(&msg).unwrap();
    let validated = validate_message(&raw).unwrap();
    assert_eq!(validated.message_type, MessageType::TaskRequest);
    assert!(validated.message_type.is_core());

    let request = validate_task_request(&validated.payload).unwrap();
    assert_eq!(request.task_type, "research.web.search");
    assert!(is_valid_task_type(&request.task_type));
    assert_eq!(supervisor_for_task(&request.task_type), "intelligence");
}

#[test]
fn rejects_a_task_request_with_out_of_range_priority() {
    let raw = serde_json::json!({
        "task_type": "writer.compose",
        "task_id": uuid::Uuid::new_v4(),
        "parameters": {},
        "priority": 200,
    });
    assert!(validate_task_request(&raw).is_err());
}

#[test]
fn validates_a_completed_task_response_with_metrics() {
    let response = TaskResponse::completed(
        uuid::Uuid::new_v4(),
        serde_json::json!({"summary": "done"}),
        TaskMetrics {
            processing_ms: 120,
            queue_ms: 5,
            retry_count: 0,
            cost_usd: 0.002,
            tokens_used: 340,
            model_used: Some("local".to_string()),
            custom_metrics: Default::default(),
        },
    );
    let raw = serde_json::to_value(&response).unwrap();
    let validated = validate_task_response(&raw).unwrap();
    assert_eq!(validated.status, TaskStatus::Completed);
    assert!(validated.status.is_terminal());
    assert_eq!(validated.metrics.tokens_used, 340);
}

#[test]
fn validates_an_agent_registration_with_capability_list() {
    let registration = AgentRegistration {
        agent_id: "vision_agent".to_string(),
        agent_name: "vision".to_string(),
        agent_type: AgentType::SubAgent,
        version: "0.1.0".to_string(),
        capabilities: vec![
            "huggingface.vision.classification".to_string(),
            "huggingface.vision.object_detection".to_string(),
        ],
        metadata: Default::default(),
        health: HealthStatus {
            healthy: true,
            status_message: "ready".to_string(),
            cpu_usage: 3.5,
            memory_mb: 128,
            active_tasks: 0,
            last_heartbeat: Utc::now(),
        },
        registered_at: Utc::now(),
    };

    let raw = serde_json::to_value(&registration).unwrap();
    let round_tripped: AgentRegistration = serde_json::from_value(raw).unwrap();
    assert_eq!(round_tripped.capabilities.len(), 2);
    assert_eq!(supervisor_for_task(&round_tripped.capabilities[0]), "multimodal");
}

#[test]
fn a_reply_swaps_addresses_and_shares_wire_identity_across_json() {
    let original = Message::new(
        "orchestrator",
        "code_writer_agent",
        MessageType::TaskRequest,
        serde_json::json!({}),
        Context::new("req-99", 5_000),
        DeliveryOptions::default(),
    );
    let reply = original.reply(MessageType::TaskResponse, serde_json::json!({"status": "accepted"}));

    let raw_reply = serde_json::to_value(&reply).unwrap();
    let validated_reply = validate_message(&raw_reply).unwrap();

    assert_eq!(validated_reply.correlation_id, Some(original.id));
    assert_eq!(validated_reply.sender, "code_writer_agent");
    assert_eq!(validated_reply.recipient, "orchestrator");
    assert_eq!(validated_reply.trace_id, original.trace_id);
}
