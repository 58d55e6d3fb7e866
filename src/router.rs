//! Agent manager: a named worker pool, a keyword-based router, and
//! exponential-moving-average performance tracking.
//!
//! This is the orchestrator-side counterpart to [`crate::bridge`]: rather
//! than answering "which task types does this process claim", it answers
//! "given a free-form task description, which one of my named workers
//! should run it" — deterministically, by the fixed keyword rules below.

use crate::error::{McpError, McpResult};
use crate::schema::TaskRequest;
use crate::worker::Worker;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub const SUPERVISOR_AGENT_ID: &str = "supervisor_agent";
pub const RESEARCH_AGENT_ID: &str = "research_agent";
pub const VISION_AGENT_ID: &str = "vision_agent";
pub const COMPUTER_USE_AGENT_ID: &str = "computer_use_agent";
pub const CODE_WRITER_AGENT_ID: &str = "code_writer_agent";
pub const WRITER_AGENT_ID: &str = "writer_agent";

const COMPUTER_USE_KEYWORDS: &[&str] = &[
    "screenshot", "click", "type", "scroll", "navigate", "browse", "open application",
    "close window", "desktop", "automate", "gui", "interface", "button", "menu", "mouse",
    "keyboard",
];

const RESEARCH_KEYWORDS: &[&str] = &[
    "search", "research", "find information", "look up", "investigate", "gather data",
    "fact check", "web search", "current events",
];

const VISION_KEYWORDS: &[&str] = &[
    "image", "picture", "screenshot", "visual", "analyze image", "ocr", "computer vision",
    "describe image",
];

const CODE_KEYWORDS: &[&str] = &[
    "code", "program", "script", "function", "debug", "implement", "programming", "software",
    "algorithm", "javascript", "python",
];

const WRITING_KEYWORDS: &[&str] = &[
    "write", "create content", "article", "blog", "essay", "documentation", "report", "copy",
    "compose",
];

/// Tools every routed task is handed by default, ahead of any per-agent grant.
pub const DEFAULT_TOOLS: &[&str] = &[
    "web_search",
    "file_read",
    "file_write",
    "screenshot",
    "system_info",
    "execute_code",
];

/// Whether `description` matches any keyword in `group` (case-insensitive substring).
fn matches_any(description_lower: &str, group: &[&str]) -> bool {
    group.iter().any(|kw| description_lower.contains(kw))
}

/// Deterministic keyword router: preferred override, then computer-use,
/// then the four keyword groups in fixed priority order, then supervisor.
pub fn route_by_keywords(description: &str, preferred: Option<&str>) -> &'static str {
    if let Some(p) = preferred {
        if let Some(known) = known_agent_id(p) {
            return known;
        }
    }

    let lower = description.to_lowercase();

    if matches_any(&lower, COMPUTER_USE_KEYWORDS) {
        return COMPUTER_USE_AGENT_ID;
    }
    if matches_any(&lower, RESEARCH_KEYWORDS) {
        return RESEARCH_AGENT_ID;
    }
    if matches_any(&lower, VISION_KEYWORDS) {
        return VISION_AGENT_ID;
    }
    if matches_any(&lower, CODE_KEYWORDS) {
        return CODE_WRITER_AGENT_ID;
    }
    if matches_any(&lower, WRITING_KEYWORDS) {
        return WRITER_AGENT_ID;
    }
    SUPERVISOR_AGENT_ID
}

fn known_agent_id(candidate: &str) -> Option<&'static str> {
    [
        SUPERVISOR_AGENT_ID,
        RESEARCH_AGENT_ID,
        VISION_AGENT_ID,
        COMPUTER_USE_AGENT_ID,
        CODE_WRITER_AGENT_ID,
        WRITER_AGENT_ID,
    ]
    .into_iter()
    .find(|id| *id == candidate)
}

/// Whether `description` trips the computer-use keyword set, independent of routing.
pub fn requires_computer_use(description: &str) -> bool {
    matches_any(&description.to_lowercase(), COMPUTER_USE_KEYWORDS)
}

/// Rolling success-rate and latency counters for one worker.
#[derive(Debug, Clone)]
pub struct AgentPerformance {
    pub tasks_completed: u64,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
    pub last_active: Option<DateTime<Utc>>,
}

impl Default for AgentPerformance {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            success_rate: 1.0,
            average_response_time_ms: 0.0,
            last_active: None,
        }
    }
}

const EMA_ALPHA: f64 = 0.1;

impl AgentPerformance {
    fn record(&mut self, success: bool, response_time_ms: f64) {
        self.tasks_completed += 1;
        self.last_active = Some(Utc::now());

        let observed_success = if success { 1.0 } else { 0.0 };
        self.success_rate = EMA_ALPHA * observed_success + (1.0 - EMA_ALPHA) * self.success_rate;

        if response_time_ms > 0.0 {
            self.average_response_time_ms =
                EMA_ALPHA * response_time_ms + (1.0 - EMA_ALPHA) * self.average_response_time_ms;
        }
    }
}

/// One completed routing decision, kept for `delegation_history`.
#[derive(Debug, Clone)]
pub struct DelegationRecord {
    pub task_id: Uuid,
    pub description: String,
    pub assigned_agent: String,
    pub success: bool,
    pub execution_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

const DESCRIPTION_TRUNCATE_LEN: usize = 120;

/// Default soft cap on tasks executing concurrently through one manager.
const DEFAULT_MAX_CONCURRENT_TASKS: usize = 10;

/// Releases its in-flight slot when dropped, however `execute_task` returns.
struct TaskSlot<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for TaskSlot<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Named worker pool plus the keyword router and performance ledger.
pub struct AgentManager {
    workers: DashMap<String, Arc<dyn Worker>>,
    performance: DashMap<String, AgentPerformance>,
    delegation_history: tokio::sync::Mutex<Vec<DelegationRecord>>,
    max_concurrent_tasks: usize,
    in_flight_tasks: AtomicUsize,
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentManager {
    pub fn new() -> Self {
        Self::with_concurrency_limit(DEFAULT_MAX_CONCURRENT_TASKS)
    }

    /// Build a manager with a non-default admission-control cap on tasks
    /// executing at once. Exceeding it returns `McpError::QueueFull`.
    pub fn with_concurrency_limit(max_concurrent_tasks: usize) -> Self {
        Self {
            workers: DashMap::new(),
            performance: DashMap::new(),
            delegation_history: tokio::sync::Mutex::new(Vec::new()),
            max_concurrent_tasks,
            in_flight_tasks: AtomicUsize::new(0),
        }
    }

    fn acquire_slot(&self) -> McpResult<TaskSlot<'_>> {
        loop {
            let current = self.in_flight_tasks.load(Ordering::SeqCst);
            if current >= self.max_concurrent_tasks {
                return Err(McpError::QueueFull(format!(
                    "in-flight task limit of {} reached",
                    self.max_concurrent_tasks
                )));
            }
            if self
                .in_flight_tasks
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(TaskSlot { in_flight: &self.in_flight_tasks });
            }
        }
    }

    /// Register a named worker. Re-registering the same id is an error —
    /// callers that want to replace a worker must deregister first.
    pub fn register_worker(&self, agent_id: impl Into<String>, worker: Arc<dyn Worker>) -> McpResult<()> {
        let agent_id = agent_id.into();
        if self.workers.contains_key(&agent_id) {
            return Err(McpError::ConfigurationError(format!(
                "worker {agent_id} already registered"
            )));
        }
        self.workers.insert(agent_id.clone(), worker);
        self.performance.insert(agent_id, AgentPerformance::default());
        Ok(())
    }

    /// Route, execute, and record one task described in free text.
    pub async fn execute_task(
        &self,
        description: &str,
        parameters: serde_json::Value,
        preferred: Option<&str>,
    ) -> McpResult<serde_json::Value> {
        let _slot = self.acquire_slot()?;

        // A preferred id that names a live worker wins outright, even if it
        // isn't one of the six built-in agent-id constants `route_by_keywords`
        // itself recognizes.
        let agent_id = match preferred {
            Some(p) if self.workers.contains_key(p) => p.to_string(),
            _ => route_by_keywords(description, preferred).to_string(),
        };
        let computer_use_enabled = requires_computer_use(description);

        let worker = self
            .workers
            .get(&agent_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| McpError::AgentUnavailable(format!("worker {agent_id} not registered")))?;

        let mut task_payload = serde_json::json!({
            "description": description,
            "tools": DEFAULT_TOOLS,
            "computer_use_enabled": computer_use_enabled,
        });
        if let serde_json::Value::Object(ref mut map) = task_payload {
            if let serde_json::Value::Object(extra) = parameters {
                map.extend(extra);
            }
        }

        let mut request = TaskRequest::new(agent_id.clone(), task_payload);
        request.preferred_agent = preferred.map(String::from);

        let started = Instant::now();
        let outcome = worker.execute_task(request.clone()).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let success = outcome.is_ok();
        if let Some(mut perf) = self.performance.get_mut(&agent_id) {
            perf.record(success, elapsed_ms);
        }

        let mut history = self.delegation_history.lock().await;
        history.push(DelegationRecord {
            task_id: request.task_id,
            description: truncate(description),
            assigned_agent: agent_id,
            success,
            execution_time_ms: elapsed_ms,
            timestamp: Utc::now(),
        });

        outcome
    }

    /// Status for one worker, or all workers plus manager-level aggregates when `agent_id` is `None`.
    pub async fn get_status(&self, agent_id: Option<&str>) -> McpResult<serde_json::Value> {
        if let Some(id) = agent_id {
            let perf = self
                .performance
                .get(id)
                .ok_or_else(|| McpError::AgentUnavailable(format!("agent {id} not found")))?;
            return Ok(serde_json::json!({
                "agent_id": id,
                "tasks_completed": perf.tasks_completed,
                "success_rate": perf.success_rate,
                "average_response_time_ms": perf.average_response_time_ms,
                "last_active": perf.last_active,
            }));
        }

        let agents: serde_json::Map<String, serde_json::Value> = self
            .performance
            .iter()
            .map(|entry| {
                let perf = entry.value();
                (
                    entry.key().clone(),
                    serde_json::json!({
                        "tasks_completed": perf.tasks_completed,
                        "success_rate": perf.success_rate,
                        "average_response_time_ms": perf.average_response_time_ms,
                        "last_active": perf.last_active,
                    }),
                )
            })
            .collect();

        let history = self.delegation_history.lock().await;
        let recent: Vec<_> = history
            .iter()
            .rev()
            .take(10)
            .map(|r| {
                serde_json::json!({
                    "task_id": r.task_id,
                    "description": r.description,
                    "assigned_agent": r.assigned_agent,
                    "success": r.success,
                    "execution_time_ms": r.execution_time_ms,
                    "timestamp": r.timestamp,
                })
            })
            .collect();

        Ok(serde_json::json!({
            "agents": agents,
            "manager_stats": {
                "total_agents": self.workers.len(),
                "total_delegations": history.len(),
                "recent_delegations": recent,
            }
        }))
    }

    /// Clear the worker pool and performance ledger. Does not interrupt
    /// in-flight `execute_task` calls; callers should drain those first.
    pub fn shutdown(&self) {
        self.workers.clear();
        self.performance.clear();
    }
}

fn truncate(description: &str) -> String {
    if description.len() <= DESCRIPTION_TRUNCATE_LEN {
        description.to_string()
    } else {
        let mut truncated = description.chars().take(DESCRIPTION_TRUNCATE_LEN).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::tests_support::EchoWorker;

    fn worker(name: &str) -> Arc<dyn Worker> {
        Arc::new(EchoWorker {
            name: name.to_string(),
            capabilities: vec![],
        })
    }

    #[test]
    fn preferred_override_wins() {
        assert_eq!(
            route_by_keywords("write an article", Some(CODE_WRITER_AGENT_ID)),
            CODE_WRITER_AGENT_ID
        );
    }

    #[test]
    fn computer_use_beats_other_keywords() {
        // Contains both "search" (research) and "click" (computer-use); computer-use wins.
        assert_eq!(
            route_by_keywords("search the screen then click the button", None),
            COMPUTER_USE_AGENT_ID
        );
    }

    #[test]
    fn keyword_groups_in_priority_order() {
        assert_eq!(route_by_keywords("please research the topic", None), RESEARCH_AGENT_ID);
        assert_eq!(route_by_keywords("describe this image for me", None), VISION_AGENT_ID);
        assert_eq!(route_by_keywords("debug this python function", None), CODE_WRITER_AGENT_ID);
        assert_eq!(route_by_keywords("compose a blog post", None), WRITER_AGENT_ID);
    }

    #[test]
    fn default_falls_back_to_supervisor() {
        assert_eq!(route_by_keywords("coordinate the overall plan", None), SUPERVISOR_AGENT_ID);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(route_by_keywords("SEARCH for recent news", None), RESEARCH_AGENT_ID);
    }

    #[tokio::test]
    async fn duplicate_registration_is_an_error() {
        let manager = AgentManager::new();
        manager.register_worker(SUPERVISOR_AGENT_ID, worker(SUPERVISOR_AGENT_ID)).unwrap();
        let err = manager
            .register_worker(SUPERVISOR_AGENT_ID, worker(SUPERVISOR_AGENT_ID))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn preferred_registered_worker_wins_even_under_a_non_constant_id() {
        let manager = AgentManager::new();
        manager.register_worker("custom_writer", worker("custom_writer")).unwrap();
        manager.register_worker(RESEARCH_AGENT_ID, worker(RESEARCH_AGENT_ID)).unwrap();

        manager
            .execute_task(
                "please research this topic thoroughly",
                serde_json::json!({}),
                Some("custom_writer"),
            )
            .await
            .unwrap();

        let status = manager.get_status(None).await.unwrap();
        assert_eq!(
            status["manager_stats"]["recent_delegations"][0]["assigned_agent"],
            "custom_writer"
        );
    }

    #[tokio::test]
    async fn unregistered_preferred_id_falls_back_to_keyword_routing() {
        let manager = AgentManager::new();
        manager.register_worker(RESEARCH_AGENT_ID, worker(RESEARCH_AGENT_ID)).unwrap();

        manager
            .execute_task(
                "please research this topic",
                serde_json::json!({}),
                Some("nobody_registered_under_this_id"),
            )
            .await
            .unwrap();

        let status = manager.get_status(None).await.unwrap();
        assert_eq!(
            status["manager_stats"]["recent_delegations"][0]["assigned_agent"],
            RESEARCH_AGENT_ID
        );
    }

    #[tokio::test]
    async fn concurrency_cap_rejects_once_the_limit_is_reached() {
        let manager = Arc::new(AgentManager::with_concurrency_limit(1));
        manager.register_worker(SUPERVISOR_AGENT_ID, worker(SUPERVISOR_AGENT_ID)).unwrap();

        // Hold the only slot open across an await point, then try a second
        // call concurrently and expect it to be rejected with queue-full.
        let held = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let blocking_manager = Arc::clone(&manager);
        let held_clone = Arc::clone(&held);
        let release_clone = Arc::clone(&release);

        let blocked = tokio::spawn(async move {
            let _slot = blocking_manager.acquire_slot().unwrap();
            held_clone.notify_one();
            release_clone.notified().await;
        });

        held.notified().await;
        let err = manager
            .execute_task("coordinate the plan", serde_json::json!({}), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::QueueFull);

        release.notify_one();
        blocked.await.unwrap();
    }

    #[tokio::test]
    async fn execute_task_updates_performance_and_history() {
        let manager = AgentManager::new();
        manager
            .register_worker(RESEARCH_AGENT_ID, worker(RESEARCH_AGENT_ID))
            .unwrap();

        manager
            .execute_task("please research climate trends", serde_json::json!({}), None)
            .await
            .unwrap();

        let status = manager.get_status(Some(RESEARCH_AGENT_ID)).await.unwrap();
        assert_eq!(status["tasks_completed"], 1);

        let all = manager.get_status(None).await.unwrap();
        assert_eq!(all["manager_stats"]["total_delegations"], 1);
    }
}
