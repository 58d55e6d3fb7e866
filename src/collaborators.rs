//! Collaborator trait interfaces: the pluggable backends the bus talks to
//! but does not implement itself (an LLM provider, a vector index, a
//! persistence layer, a desktop-automation backend).
//!
//! Each trait ships a small in-module mock alongside it, in the teacher's
//! `MockToolProtocol` style, for use by both unit and integration tests.

use crate::error::{McpError, McpResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One turn of a chat-style conversation handed to [`LlmProvider::create_chat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Token accounting reported back by a provider call, when it reports one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Result of [`LlmProvider::create_chat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// A single tool invocation requested by the model in a `create_responses` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseChoiceMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseChoiceMessage,
}

/// Result of [`LlmProvider::create_responses`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesOutput {
    pub choices: Vec<ResponseChoice>,
    pub reasoning: Option<serde_json::Value>,
    pub usage: Option<TokenUsage>,
}

/// A chat/completion model a worker can call to produce its result.
///
/// Two call shapes, matching the two styles of model API a worker might sit
/// in front of: `create_chat` for a plain message-list completion,
/// `create_responses` for a tool-augmented, multi-item response API.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn create_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> McpResult<ChatCompletion>;

    async fn create_responses(
        &self,
        model: &str,
        input_items: &[serde_json::Value],
        tools: &[serde_json::Value],
        reasoning: Option<serde_json::Value>,
        truncation: Option<&str>,
    ) -> McpResult<ResponsesOutput>;
}

/// L2-normalizes a vector so a plain dot product against another normalized
/// vector equals cosine similarity. Callers normalize embeddings before
/// `VectorIndex::add`/`search`; implementations may assume their inputs
/// already are.
pub fn cosine_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// A similarity-searchable store of embedded documents.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn add(
        &self,
        vectors: Vec<Vec<f32>>,
        ids: Vec<String>,
        metadata: Vec<serde_json::Value>,
    ) -> McpResult<()>;

    async fn search(
        &self,
        vector: Vec<f32>,
        k: usize,
        threshold: Option<f32>,
    ) -> McpResult<Vec<(String, f32)>>;

    fn size(&self) -> usize;
}

/// Durable storage for conversation and task state across restarts.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save(&self, key: &str, value: serde_json::Value) -> McpResult<()>;
    async fn load(&self, key: &str) -> McpResult<Option<serde_json::Value>>;
    async fn delete(&self, key: &str) -> McpResult<()>;
}

/// Desktop-automation surface behind the computer-use worker and the
/// `screenshot` tool.
///
/// The bus ships only [`DisabledAutomationBackend`]: wiring a real backend
/// (platform-specific input injection and screen capture) is out of scope
/// here, matching the Non-goal that excludes computer-use execution itself
/// while still routing such tasks correctly (§4.4).
#[async_trait]
pub trait AutomationBackend: Send + Sync {
    async fn screenshot(&self) -> McpResult<Vec<u8>>;
    async fn click(&self, x: i32, y: i32) -> McpResult<()>;
    async fn type_text(&self, text: &str) -> McpResult<()>;
}

/// The only `AutomationBackend` shipped by the bus: every operation reports
/// `ServiceUnavailable` rather than touching a real display.
pub struct DisabledAutomationBackend;

#[async_trait]
impl AutomationBackend for DisabledAutomationBackend {
    async fn screenshot(&self) -> McpResult<Vec<u8>> {
        Err(McpError::ServiceUnavailable(
            "no automation backend configured".to_string(),
        ))
    }

    async fn click(&self, _x: i32, _y: i32) -> McpResult<()> {
        Err(McpError::ServiceUnavailable(
            "no automation backend configured".to_string(),
        ))
    }

    async fn type_text(&self, _text: &str) -> McpResult<()> {
        Err(McpError::ServiceUnavailable(
            "no automation backend configured".to_string(),
        ))
    }
}
