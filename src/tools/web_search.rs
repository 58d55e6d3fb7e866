//! Public web-search tool, backed by DuckDuckGo's instant-answer API.

use crate::error::{McpError, McpResult};
use crate::tool_registry::{Tool, ToolPermissionLevel};
use async_trait::async_trait;

pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information"
    }

    fn permission_level(&self) -> ToolPermissionLevel {
        ToolPermissionLevel::Public
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"},
                "num_results": {"type": "integer", "description": "Number of results to return", "default": 5}
            },
            "required": ["query"]
        })
    }

    async fn call(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| McpError::InvalidParameters("query is required".to_string()))?;
        let num_results = params.get("num_results").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

        let response = self
            .client
            .get("https://api.duckduckgo.com/")
            .query(&[("q", query), ("format", "json"), ("no_html", "1"), ("skip_disambig", "1")])
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| McpError::NetworkError(format!("web search request failed: {e}")))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| McpError::NetworkError(format!("web search response invalid: {e}")))?;

        let results: Vec<serde_json::Value> = body
            .get("RelatedTopics")
            .and_then(|v| v.as_array())
            .map(|topics| {
                topics
                    .iter()
                    .take(num_results)
                    .filter_map(|topic| {
                        let text = topic.get("Text")?.as_str()?;
                        let url = topic.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
                        Some(serde_json::json!({
                            "title": url.rsplit('/').next().unwrap_or(""),
                            "snippet": text,
                            "url": url,
                        }))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(serde_json::json!({
            "query": query,
            "total_results": results.len(),
            "results": results,
        }))
    }
}
