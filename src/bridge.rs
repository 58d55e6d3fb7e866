//! Per-process worker bridge.
//!
//! A bridge owns one transport connection, a capability-indexed registry of
//! local [`Worker`]s, and the set of tasks currently running on their
//! behalf. It speaks the control vocabulary of the bus (handshake,
//! heartbeat, agent query, status request, shutdown) on top of the framed
//! transport and turns `task_request` messages into `accepted` → `running`
//! → terminal response sequences.

use crate::error::{McpError, McpResult};
use crate::schema::{AgentType, Context, DeliveryOptions, Message, MessageType, TaskMetrics, TaskResponse};
use crate::transport::{MessageHandler, UnixSocketClient, DEFAULT_HEARTBEAT_INTERVAL};
use crate::worker::Worker;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use uuid::Uuid;

const ORCHESTRATOR_NAME: &str = "orchestrator";

#[derive(Debug, Default)]
struct BridgeStats {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    tasks_executed: AtomicU64,
    connection_failures: AtomicU64,
}

/// Language tag reported in this bridge's `handshake`/`agent_registration`
/// control messages. The bus ships one bridge implementation, in Rust.
const BRIDGE_LANGUAGE: &str = "rust";

/// Per-process bridge connecting a pool of local [`Worker`]s to the bus.
pub struct WorkerBridge {
    agent_id: String,
    socket_path: PathBuf,
    client: UnixSocketClient,
    workers: DashMap<String, Arc<dyn Worker>>,
    capability_index: DashMap<String, Vec<String>>,
    active_tasks: DashMap<Uuid, tokio::task::JoinHandle<()>>,
    stats: BridgeStats,
    running: AtomicBool,
}

impl WorkerBridge {
    /// Create a bridge bound to `socket_path`, identified as `agent_id`.
    pub fn new(socket_path: impl Into<PathBuf>, agent_id: impl Into<String>) -> Arc<Self> {
        let socket_path = socket_path.into();
        let agent_id = agent_id.into();
        Arc::new_cyclic(|weak: &Weak<WorkerBridge>| {
            let handler = Arc::new(BridgeHandler { bridge: weak.clone() });
            WorkerBridge {
                agent_id,
                socket_path: socket_path.clone(),
                client: UnixSocketClient::new(socket_path, handler),
                workers: DashMap::new(),
                capability_index: DashMap::new(),
                active_tasks: DashMap::new(),
                stats: BridgeStats::default(),
                running: AtomicBool::new(false),
            }
        })
    }

    /// This bridge's service endpoint, as reported in control messages: the
    /// filesystem socket it connects through, since a worker process has no
    /// other address the orchestrator could dial back.
    fn service_endpoint(&self) -> String {
        format!("unix://{}", self.socket_path.display())
    }

    /// Register a worker and index its declared capabilities.
    pub async fn register_worker(&self, worker: Arc<dyn Worker>) -> McpResult<()> {
        let name = worker.name().to_string();
        for capability in worker.capabilities() {
            self.capability_index
                .entry(capability.clone())
                .or_default()
                .push(name.clone());
        }
        let capabilities = worker.capabilities().to_vec();
        self.workers.insert(name.clone(), worker);

        if self.client.is_connected().await {
            let registration = Message::new(
                &self.agent_id,
                ORCHESTRATOR_NAME,
                MessageType::AgentRegister,
                serde_json::json!({
                    "agent_name": name,
                    "agent_type": AgentType::SubAgent,
                    "language": BRIDGE_LANGUAGE,
                    "capabilities": capabilities,
                    "service_endpoint": self.service_endpoint(),
                    "status": "ready",
                }),
                Context::new(Uuid::new_v4().to_string(), 5_000),
                DeliveryOptions::default(),
            );
            self.send(&registration).await?;
        }
        Ok(())
    }

    /// Connect to the orchestrator, send the handshake, and start the
    /// heartbeat loop. Returns once the handshake has been sent.
    pub async fn start(self: &Arc<Self>) -> McpResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client.connect().await.map_err(|e| {
            self.stats.connection_failures.fetch_add(1, Ordering::SeqCst);
            e
        })?;

        let handshake = Message::new(
            &self.agent_id,
            ORCHESTRATOR_NAME,
            MessageType::Handshake,
            serde_json::json!({
                "service_type": "worker_bridge",
                "version": env!("CARGO_PKG_VERSION"),
                "capabilities": self.capability_index.iter().map(|e| e.key().clone()).collect::<Vec<_>>(),
            }),
            Context::new(Uuid::new_v4().to_string(), 5_000),
            DeliveryOptions::default(),
        );
        self.send(&handshake).await?;

        let this = Arc::clone(self);
        tokio::spawn(async move { this.heartbeat_loop().await });

        log::info!("worker bridge {} started", self.agent_id);
        Ok(())
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            let heartbeat = Message::new(
                &self.agent_id,
                ORCHESTRATOR_NAME,
                MessageType::Heartbeat,
                serde_json::json!({"status": "healthy"}),
                Context::new(Uuid::new_v4().to_string(), 5_000),
                DeliveryOptions::default(),
            );
            match self.send(&heartbeat).await {
                Ok(()) => tokio::time::sleep(DEFAULT_HEARTBEAT_INTERVAL).await,
                Err(e) => {
                    log::error!("heartbeat failed: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn send(&self, message: &Message) -> McpResult<()> {
        self.client.send_message(message).await?;
        self.stats.messages_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispatch(self: &Arc<Self>, message: Message) -> McpResult<()> {
        self.stats.messages_received.fetch_add(1, Ordering::SeqCst);
        match message.message_type {
            MessageType::TaskRequest => self.handle_task_request(message).await,
            MessageType::Heartbeat => self.handle_heartbeat(message).await,
            MessageType::AgentQuery => self.handle_agent_query(message).await,
            MessageType::StatusRequest => self.handle_status_request(message).await,
            MessageType::Shutdown => {
                self.handle_shutdown();
                Ok(())
            }
            other => {
                log::warn!("unhandled message type: {other:?}");
                Ok(())
            }
        }
    }

    fn capable_workers(&self, task_type: &str) -> Vec<String> {
        self.capability_index
            .get(task_type)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    async fn handle_task_request(self: &Arc<Self>, message: Message) -> McpResult<()> {
        let request: crate::schema::TaskRequest = serde_json::from_value(message.payload.clone())
            .map_err(|e| McpError::InvalidParameters(e.to_string()))?;

        let candidates = self.capable_workers(&request.task_type);
        let selected_name = request
            .preferred_agent
            .clone()
            .filter(|p| candidates.contains(p))
            .or_else(|| candidates.first().cloned());

        let selected = match selected_name.and_then(|name| self.workers.get(&name).map(|e| Arc::clone(e.value()))) {
            Some(worker) => worker,
            None => {
                let error = McpError::AgentUnavailable(format!(
                    "no worker registered for task type {}",
                    request.task_type
                ));
                let reply = message.reply(
                    MessageType::TaskResponse,
                    serde_json::to_value(TaskResponse::failed(request.task_id, &error)).unwrap(),
                );
                return self.send(&reply).await;
            }
        };

        let accepted = message.reply(
            MessageType::TaskResponse,
            serde_json::to_value(TaskResponse::accepted(request.task_id).with_agent(selected.name()))
                .unwrap(),
        );
        self.send(&accepted).await?;

        let this = Arc::clone(self);
        let origin = message.sender.clone();
        let correlation_id = message.id;
        let task_id = request.task_id;
        let handle = tokio::spawn(async move {
            this.run_task(selected, request, origin, correlation_id).await;
        });
        self.active_tasks.insert(task_id, handle);
        Ok(())
    }

    async fn run_task(
        self: Arc<Self>,
        worker: Arc<dyn Worker>,
        request: crate::schema::TaskRequest,
        origin: String,
        correlation_id: Uuid,
    ) {
        let task_id = request.task_id;
        let agent_name = worker.name().to_string();

        let running = TaskResponse::running(task_id).with_agent(agent_name.clone());
        let mut running_message = Message::new(
            &self.agent_id,
            &origin,
            MessageType::TaskResponse,
            serde_json::to_value(running).unwrap(),
            Context::new(Uuid::new_v4().to_string(), 5_000),
            DeliveryOptions::default(),
        );
        running_message.correlation_id = Some(correlation_id);
        if let Err(e) = self.send(&running_message).await {
            log::error!("failed to send running update for {task_id}: {e}");
        }

        let started = Instant::now();
        let outcome = worker.execute_task(request).await;
        let processing_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(result) => {
                let mut metrics = TaskMetrics::default();
                metrics.processing_ms = processing_ms;
                TaskResponse::completed(task_id, result, metrics).with_agent(agent_name)
            }
            Err(e) => TaskResponse::failed(task_id, &e).with_agent(agent_name),
        };
        self.stats.tasks_executed.fetch_add(1, Ordering::SeqCst);

        let mut terminal_message = Message::new(
            &self.agent_id,
            &origin,
            MessageType::TaskResponse,
            serde_json::to_value(response).unwrap(),
            Context::new(Uuid::new_v4().to_string(), 5_000),
            DeliveryOptions::default(),
        );
        terminal_message.correlation_id = Some(correlation_id);
        if let Err(e) = self.send(&terminal_message).await {
            log::error!("failed to send terminal response for {task_id}: {e}");
        }

        self.active_tasks.remove(&task_id);
        log::info!("task {task_id} completed in {processing_ms}ms");
    }

    async fn handle_heartbeat(&self, message: Message) -> McpResult<()> {
        let reply = message.reply(
            MessageType::HeartbeatResponse,
            serde_json::json!({
                "status": "healthy",
                "active_tasks": self.active_tasks.len(),
                "registered_workers": self.workers.len(),
            }),
        );
        self.send(&reply).await
    }

    async fn handle_agent_query(&self, message: Message) -> McpResult<()> {
        let required: Vec<String> = message
            .payload
            .get("capabilities")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let matching: Vec<serde_json::Value> = self
            .workers
            .iter()
            .filter(|entry| required.is_empty() || entry.value().capabilities().iter().any(|c| required.contains(c)))
            .map(|entry| {
                serde_json::json!({
                    "name": entry.key(),
                    "capabilities": entry.value().capabilities(),
                })
            })
            .collect();

        let reply = message.reply(
            MessageType::AgentQueryResponse,
            serde_json::json!({
                "matching_agents": matching,
                "total_agents": self.workers.len(),
            }),
        );
        self.send(&reply).await
    }

    async fn handle_status_request(&self, message: Message) -> McpResult<()> {
        let capability_index: std::collections::HashMap<String, Vec<String>> = self
            .capability_index
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let reply = message.reply(
            MessageType::StatusResponse,
            serde_json::json!({
                "bridge_status": if self.running.load(Ordering::SeqCst) { "healthy" } else { "stopped" },
                "registered_workers": self.workers.len(),
                "active_tasks": self.active_tasks.len(),
                "capability_index": capability_index,
                "messages_sent": self.stats.messages_sent.load(Ordering::SeqCst),
                "messages_received": self.stats.messages_received.load(Ordering::SeqCst),
                "tasks_executed": self.stats.tasks_executed.load(Ordering::SeqCst),
            }),
        );
        self.send(&reply).await
    }

    fn handle_shutdown(&self) {
        log::info!("orchestrator requested shutdown of bridge {}", self.agent_id);
        self.running.store(false, Ordering::SeqCst);
        for entry in self.active_tasks.iter() {
            entry.value().abort();
        }
        self.active_tasks.clear();
    }

    /// Gracefully shut down: cancel active tasks, notify the orchestrator, disconnect.
    pub async fn shutdown(&self) -> McpResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        for entry in self.active_tasks.iter() {
            entry.value().abort();
            log::info!("cancelled active task {}", entry.key());
        }
        self.active_tasks.clear();

        if self.client.is_connected().await {
            let notice = Message::new(
                &self.agent_id,
                ORCHESTRATOR_NAME,
                MessageType::Shutdown,
                serde_json::json!({"reason": "graceful_shutdown"}),
                Context::new(Uuid::new_v4().to_string(), 5_000),
                DeliveryOptions::default(),
            );
            let _ = self.send(&notice).await;
        }
        self.client.disconnect().await;
        log::info!("worker bridge {} shutdown complete", self.agent_id);
        Ok(())
    }
}

/// Adapts [`WorkerBridge`] to the transport's [`MessageHandler`] without
/// creating an ownership cycle: the bridge owns the transport client, which
/// owns this handler, which only holds a weak reference back.
struct BridgeHandler {
    bridge: Weak<WorkerBridge>,
}

#[async_trait]
impl MessageHandler for BridgeHandler {
    async fn handle_message(&self, message: Message, _client_id: String) -> McpResult<()> {
        match self.bridge.upgrade() {
            Some(bridge) => bridge.dispatch(message).await,
            None => Ok(()),
        }
    }
}
