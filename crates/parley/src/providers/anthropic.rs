use anyhow::Result;
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::base::{EventStream, Provider};
use super::configs::AnthropicProviderConfig;
use super::errors::TransportError;
use super::sse;
use super::utils::create_request;
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("accept", "text/event-stream")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Read the whole body so the error carries the provider's explanation
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "model request failed");
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn stream(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<EventStream, TransportError> {
        let payload = create_request(model, self.config.max_tokens, system, messages, tools)
            .map_err(|e| TransportError::Stream(e.to_string()))?;

        tracing::debug!(
            model,
            messages = messages.len(),
            tools = tools.len(),
            "opening message stream"
        );
        let response = self.post(payload).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));
        Ok(Box::pin(sse::events(bytes)))
    }
}
