//! End-to-end test of the framed transport and worker bridge together: a
//! real `UnixSocketServer` plays the orchestrator, a `WorkerBridge` connects
//! as a client, and a task request runs through the full
//! accepted -> running -> completed response sequence over the socket.

use agentbus::bridge::WorkerBridge;
use agentbus::error::McpResult;
use agentbus::schema::{Context, DeliveryOptions, Message, MessageType, TaskRequest, TaskResponse, TaskStatus};
use agentbus::transport::{MessageHandler, UnixSocketServer};
use agentbus::worker::Worker;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

struct UppercaseWorker {
    capabilities: Vec<String>,
}

#[async_trait]
impl Worker for UppercaseWorker {
    fn name(&self) -> &str {
        "worker-1"
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    async fn execute_task(&self, request: TaskRequest) -> McpResult<serde_json::Value> {
        let text = request.parameters.get("text").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(serde_json::json!({"result": text.to_uppercase()}))
    }
}

struct CapturingHandler {
    received: Mutex<Vec<Message>>,
    notify: Notify,
}

#[async_trait]
impl MessageHandler for CapturingHandler {
    async fn handle_message(&self, message: Message, _client_id: String) -> McpResult<()> {
        self.received.lock().await.push(message);
        self.notify.notify_one();
        Ok(())
    }
}

#[tokio::test]
async fn task_request_runs_through_accepted_running_completed() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("bridge_integration.sock");

    let orchestrator_handler = Arc::new(CapturingHandler {
        received: Mutex::new(Vec::new()),
        notify: Notify::new(),
    });
    let server = Arc::new(UnixSocketServer::new(&socket_path, orchestrator_handler.clone()));
    server.start().await.unwrap();

    let bridge = WorkerBridge::new(&socket_path, "worker-1");
    bridge
        .register_worker(Arc::new(UppercaseWorker {
            capabilities: vec!["writer.compose".to_string()],
        }))
        .await
        .unwrap();
    bridge.start().await.unwrap();

    // The handshake is the first message the server sees; by the time its
    // handler runs, accept_connection has already registered the client.
    orchestrator_handler.notify.notified().await;
    let client_id = server.connected_clients().into_iter().next().unwrap();

    let request = TaskRequest::new("writer.compose", serde_json::json!({"text": "hello"}));
    let task_id = request.task_id;
    let task_message = Message::new(
        "orchestrator",
        "worker-1",
        MessageType::TaskRequest,
        serde_json::to_value(&request).unwrap(),
        Context::new("req-1", 5_000),
        DeliveryOptions::default(),
    );
    server.send_message(&task_message, Some(&client_id)).await.unwrap();

    let terminal = loop {
        orchestrator_handler.notify.notified().await;
        let received = orchestrator_handler.received.lock().await;
        let found = received.iter().rev().find_map(|m| {
            if m.message_type != MessageType::TaskResponse {
                return None;
            }
            let response: TaskResponse = serde_json::from_value(m.payload.clone()).ok()?;
            (response.task_id == task_id && response.status.is_terminal()).then_some(response)
        });
        drop(received);
        if let Some(response) = found {
            break response;
        }
    };

    assert_eq!(terminal.status, TaskStatus::Completed);
    assert_eq!(terminal.result.unwrap()["result"], "HELLO");
    assert_eq!(terminal.agent.as_deref(), Some("worker-1"));

    bridge.shutdown().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn task_request_for_unclaimed_type_is_reported_failed() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("bridge_unclaimed.sock");

    let orchestrator_handler = Arc::new(CapturingHandler {
        received: Mutex::new(Vec::new()),
        notify: Notify::new(),
    });
    let server = Arc::new(UnixSocketServer::new(&socket_path, orchestrator_handler.clone()));
    server.start().await.unwrap();

    let bridge = WorkerBridge::new(&socket_path, "worker-2");
    bridge
        .register_worker(Arc::new(UppercaseWorker {
            capabilities: vec!["writer.compose".to_string()],
        }))
        .await
        .unwrap();
    bridge.start().await.unwrap();

    orchestrator_handler.notify.notified().await;
    let client_id = server.connected_clients().into_iter().next().unwrap();

    let request = TaskRequest::new("codewriter.generate", serde_json::json!({}));
    let task_id = request.task_id;
    let task_message = Message::new(
        "orchestrator",
        "worker-2",
        MessageType::TaskRequest,
        serde_json::to_value(&request).unwrap(),
        Context::new("req-2", 5_000),
        DeliveryOptions::default(),
    );
    server.send_message(&task_message, Some(&client_id)).await.unwrap();

    let response = loop {
        orchestrator_handler.notify.notified().await;
        let received = orchestrator_handler.received.lock().await;
        let found = received.iter().rev().find_map(|m| {
            if m.message_type != MessageType::TaskResponse {
                return None;
            }
            let response: TaskResponse = serde_json::from_value(m.payload.clone()).ok()?;
            (response.task_id == task_id).then_some(response)
        });
        drop(received);
        if let Some(response) = found {
            break response;
        }
    };

    assert_eq!(response.status, TaskStatus::Failed);
    assert!(response.error_message.unwrap().contains("no worker registered"));

    bridge.shutdown().await.unwrap();
    server.stop().await.unwrap();
}
