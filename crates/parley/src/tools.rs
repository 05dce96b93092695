//! Built-in tools and the registry that offers and runs them.
//!
//! Which tools are offered is decided purely by which backends the registry was built
//! with, so a tool without credentials is never shown to the model. Running a tool never
//! fails: every problem becomes text the model can read and explain.

pub mod datetime;
pub mod search;
pub mod weather;

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;

use crate::errors::{ToolError, ToolResult};
use crate::key_manager::{Backend, CredentialStore};
use crate::models::message::ToolResponse;
use crate::models::tool::{Tool, ToolCall, ToolInput};
use search::{TavilySearch, WebSearch};
use weather::{OpenWeatherMap, WeatherService};

#[derive(Clone, Default)]
pub struct ToolRegistry {
    search: Option<Arc<dyn WebSearch>>,
    weather: Option<Arc<dyn WeatherService>>,
}

impl ToolRegistry {
    /// A registry with only the always-available tools
    pub fn new() -> Self {
        Self::default()
    }

    /// Build backends for every credential currently configured
    pub fn from_credentials(credentials: &impl CredentialStore) -> Self {
        let mut registry = Self::new();
        if let Some(key) = credentials.get_key(Backend::Search) {
            registry = registry.with_search(Arc::new(TavilySearch::new(key)));
        }
        if let Some(key) = credentials.get_key(Backend::Weather) {
            registry = registry.with_weather(Arc::new(OpenWeatherMap::new(key)));
        }
        registry
    }

    pub fn with_search(mut self, backend: Arc<dyn WebSearch>) -> Self {
        self.search = Some(backend);
        self
    }

    pub fn with_weather(mut self, backend: Arc<dyn WeatherService>) -> Self {
        self.weather = Some(backend);
        self
    }

    /// Tool definitions to offer the model
    pub fn available_tools(&self) -> Vec<Tool> {
        let mut tools = vec![datetime::tool()];
        if self.search.is_some() {
            tools.push(search::tool());
        }
        if self.weather.is_some() {
            tools.push(weather::tool());
        }
        tools
    }

    /// Run a tool by name. Always returns text, errors included.
    pub async fn dispatch(&self, name: &str, input: &Value) -> String {
        tracing::debug!(tool = name, "dispatching tool call");
        match self.execute(name, input).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                format!("Error: {}", e)
            }
        }
    }

    async fn execute(&self, name: &str, input: &Value) -> ToolResult<String> {
        match name {
            datetime::NAME => Ok(datetime::get_datetime()),
            search::NAME => {
                let backend = self
                    .search
                    .as_deref()
                    .ok_or_else(|| ToolError::Unavailable(name.to_string()))?;
                search::search_web(backend, input).await
            }
            weather::NAME => {
                let backend = self
                    .weather
                    .as_deref()
                    .ok_or_else(|| ToolError::Unavailable(name.to_string()))?;
                weather::get_weather(backend, input).await
            }
            _ => Err(ToolError::NotFound(name.to_string())),
        }
    }

    /// Run one round of calls concurrently, results in request order
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<ToolResponse> {
        let outputs = join_all(
            calls
                .iter()
                .map(|call| self.dispatch(&call.name, &call.input)),
        )
        .await;

        calls
            .iter()
            .zip(outputs)
            .map(|(call, output)| ToolResponse::new(call.id.clone(), output))
            .collect()
    }
}

/// A short description of an in-flight tool call for display
pub fn activity_label(call: &ToolCall) -> String {
    match call.name.as_str() {
        search::NAME => match call.input.str_arg("query").trim() {
            "" => "Searching the web…".to_string(),
            query => format!("Searching the web for \"{}\"…", query),
        },
        weather::NAME => "Checking the weather…".to_string(),
        datetime::NAME => "Checking the date and time…".to_string(),
        other => format!("Running {}…", other),
    }
}
