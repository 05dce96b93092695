use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{Tool, ToolInput};

pub const NAME: &str = "search_web";
pub const TAVILY_HOST: &str = "https://api.tavily.com";

/// Maximum number of ranked results included in a digest
pub const MAX_RESULTS: usize = 5;
/// Maximum characters kept from each result's snippet
pub const SNIPPET_BUDGET: usize = 500;

pub fn tool() -> Tool {
    Tool::new(
        NAME,
        "Search the web for current information. Use this for recent events, news, prices, \
        or anything that may have changed after your training data.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

/// A web search backend
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> ToolResult<SearchResponse>;
}

pub struct TavilySearch {
    client: Client,
    api_key: String,
    host: String,
}

impl TavilySearch {
    pub fn new<K: Into<String>>(api_key: K) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            host: TAVILY_HOST.to_string(),
        }
    }

    pub fn with_host<H: Into<String>>(mut self, host: H) -> Self {
        self.host = host.into();
        self
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> ToolResult<SearchResponse> {
        let url = format!("{}/search", self.host.trim_end_matches('/'));
        let payload = json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": "basic",
            "include_answer": true,
            "max_results": MAX_RESULTS,
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Cut `text` to at most `budget` characters, marking the cut
fn truncate(text: &str, budget: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(budget) {
        Some((end, _)) => format!("{}…", text[..end].trim_end()),
        None => text.to_string(),
    }
}

/// Combine the summary and ranked results into one readable digest
pub fn format_digest(query: &str, response: &SearchResponse) -> ToolResult<String> {
    let answer = response
        .answer
        .as_deref()
        .map(str::trim)
        .filter(|answer| !answer.is_empty());
    let hits: Vec<&SearchHit> = response
        .results
        .iter()
        .filter(|hit| !hit.content.trim().is_empty() || !hit.title.trim().is_empty())
        .take(MAX_RESULTS)
        .collect();

    if answer.is_none() && hits.is_empty() {
        return Err(ToolError::EmptyResult(query.to_string()));
    }

    let mut digest = format!("Web search results for \"{}\":\n", query);
    if let Some(answer) = answer {
        digest.push_str(&format!("\nSummary: {}\n", truncate(answer, SNIPPET_BUDGET)));
    }
    for (rank, hit) in hits.iter().enumerate() {
        digest.push_str(&format!(
            "\n{}. {}\n   Source: {}\n   {}\n",
            rank + 1,
            hit.title.trim(),
            hit.url,
            truncate(&hit.content, SNIPPET_BUDGET)
        ));
    }

    Ok(digest.trim_end().to_string())
}

pub async fn search_web(backend: &dyn WebSearch, input: &Value) -> ToolResult<String> {
    let query = input.str_arg("query").trim();
    if query.is_empty() {
        return Err(ToolError::InvalidParameters(
            "a non-empty 'query' is required".to_string(),
        ));
    }

    let response = backend.search(query).await?;
    format_digest(query, &response)
}
