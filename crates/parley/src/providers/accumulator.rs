//! Builds the result of one streaming call out of protocol events.
//!
//! Text deltas are handed back as they arrive so they can be shown immediately. Tool input
//! arrives as fragments of JSON and is only parsed once its block is closed.

use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::Usage;
use super::errors::TransportError;
use super::sse::StreamEvent;
use crate::models::tool::ToolCall;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    Other(String),
}

impl StopReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// The aggregate of one streaming call
#[derive(Debug, Clone, PartialEq)]
pub struct StreamResult {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

#[derive(Debug, Default)]
enum BlockState {
    #[default]
    Idle,
    Text,
    ToolUse {
        id: String,
        name: String,
        partial_json: String,
    },
    /// A block kind we do not handle, e.g. thinking
    Ignored,
}

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    tool_calls: Vec<ToolCall>,
    stop_reason: Option<StopReason>,
    usage: Usage,
    block: BlockState,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Apply one event. Returns the text to surface when the event was a text delta.
    pub fn apply(&mut self, event: &StreamEvent) -> Option<String> {
        match event.kind.as_str() {
            "message_start" => {
                if let Some(tokens) = event.get_u32(&["message", "usage", "input_tokens"]) {
                    self.usage.input_tokens = tokens;
                }
                None
            }
            "content_block_start" => {
                self.block = match event.get_str(&["content_block", "type"]) {
                    Some("text") => BlockState::Text,
                    Some("tool_use") => BlockState::ToolUse {
                        id: event
                            .get_str(&["content_block", "id"])
                            .unwrap_or_default()
                            .to_string(),
                        name: event
                            .get_str(&["content_block", "name"])
                            .unwrap_or_default()
                            .to_string(),
                        partial_json: String::new(),
                    },
                    _ => BlockState::Ignored,
                };
                None
            }
            "content_block_delta" => self.apply_delta(event),
            "content_block_stop" => {
                if let BlockState::ToolUse {
                    id,
                    name,
                    partial_json,
                } = std::mem::take(&mut self.block)
                {
                    self.tool_calls
                        .push(ToolCall::new(id, name, parse_tool_input(&partial_json)));
                }
                None
            }
            "message_delta" => {
                if let Some(reason) = event.get_str(&["delta", "stop_reason"]) {
                    self.stop_reason = Some(StopReason::parse(reason));
                }
                if let Some(tokens) = event.get_u32(&["usage", "output_tokens"]) {
                    self.usage.output_tokens = tokens;
                }
                None
            }
            _ => None,
        }
    }

    fn apply_delta(&mut self, event: &StreamEvent) -> Option<String> {
        match (&mut self.block, event.get_str(&["delta", "type"])) {
            (BlockState::Text, Some("text_delta")) => {
                let chunk = event.get_str(&["delta", "text"])?;
                self.text.push_str(chunk);
                Some(chunk.to_string())
            }
            (BlockState::ToolUse { partial_json, .. }, Some("input_json_delta")) => {
                if let Some(fragment) = event.get_str(&["delta", "partial_json"]) {
                    partial_json.push_str(fragment);
                }
                None
            }
            _ => None,
        }
    }

    /// Seal the result. A block still open at this point is dropped.
    pub fn finish(self) -> StreamResult {
        if !matches!(self.block, BlockState::Idle) {
            tracing::debug!("stream ended inside an open content block, discarding it");
        }
        StreamResult {
            text: self.text,
            tool_calls: self.tool_calls,
            // A missing stop reason counts as the end of the turn
            stop_reason: self.stop_reason.unwrap_or(StopReason::EndTurn),
            usage: self.usage,
        }
    }
}

/// Parse accumulated tool input, falling back to an empty object
fn parse_tool_input(partial_json: &str) -> Value {
    match serde_json::from_str::<Value>(partial_json) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            if !partial_json.is_empty() {
                tracing::warn!(input = partial_json, "tool input was not a JSON object, using {{}}");
            }
            Value::Object(Map::new())
        }
    }
}

/// Drive an event stream to completion, passing each text delta to `on_text`
pub async fn accumulate<S, F>(events: S, mut on_text: F) -> Result<StreamResult, TransportError>
where
    S: Stream<Item = Result<StreamEvent, TransportError>>,
    F: FnMut(&str),
{
    futures::pin_mut!(events);
    let mut accumulator = StreamAccumulator::new();
    while let Some(event) = events.next().await {
        if let Some(chunk) = accumulator.apply(&event?) {
            on_text(&chunk);
        }
    }
    Ok(accumulator.finish())
}
