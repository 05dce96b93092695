//! A scripted provider for tests and offline runs.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use super::base::{EventStream, Provider};
use super::errors::TransportError;
use super::sse::StreamEvent;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// One scripted streaming call
#[derive(Debug)]
pub enum MockReply {
    Events(Vec<Result<StreamEvent, TransportError>>),
    /// Fail before any event is produced
    Error(TransportError),
}

impl MockReply {
    /// A reply made of a text block with the given deltas and `end_turn`
    pub fn text(deltas: &[&str]) -> Self {
        ScriptBuilder::new().text(deltas).stop("end_turn").build()
    }

    /// A reply requesting a single tool
    pub fn tool_use(id: &str, name: &str, input: Value) -> Self {
        ScriptBuilder::new()
            .tool_use(id, name, &[&input.to_string()])
            .stop("tool_use")
            .build()
    }
}

/// Builds realistic event sequences one block at a time
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    events: Vec<Value>,
    index: u32,
    input_tokens: u32,
    output_tokens: u32,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self {
            input_tokens: 10,
            output_tokens: 5,
            ..Default::default()
        }
    }

    pub fn usage(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn text(mut self, deltas: &[&str]) -> Self {
        let index = self.index;
        self.events.push(json!({
            "type": "content_block_start",
            "index": index,
            "content_block": {"type": "text", "text": ""}
        }));
        for delta in deltas {
            self.events.push(json!({
                "type": "content_block_delta",
                "index": index,
                "delta": {"type": "text_delta", "text": delta}
            }));
        }
        self.events
            .push(json!({"type": "content_block_stop", "index": index}));
        self.index += 1;
        self
    }

    pub fn tool_use(mut self, id: &str, name: &str, fragments: &[&str]) -> Self {
        let index = self.index;
        self.events.push(json!({
            "type": "content_block_start",
            "index": index,
            "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}}
        }));
        for fragment in fragments {
            self.events.push(json!({
                "type": "content_block_delta",
                "index": index,
                "delta": {"type": "input_json_delta", "partial_json": fragment}
            }));
        }
        self.events
            .push(json!({"type": "content_block_stop", "index": index}));
        self.index += 1;
        self
    }

    /// Close the message with the given stop reason
    pub fn stop(mut self, reason: &str) -> Self {
        self.events.push(json!({
            "type": "message_delta",
            "delta": {"stop_reason": reason},
            "usage": {"output_tokens": self.output_tokens}
        }));
        self
    }

    /// Push a raw event, for malformed sequences
    pub fn raw(mut self, event: Value) -> Self {
        self.events.push(event);
        self
    }

    pub fn build(self) -> MockReply {
        let start = json!({
            "type": "message_start",
            "message": {"usage": {"input_tokens": self.input_tokens, "output_tokens": 1}}
        });
        let stop = json!({"type": "message_stop"});

        let events = std::iter::once(start)
            .chain(self.events)
            .chain(std::iter::once(stop))
            .filter_map(StreamEvent::from_value)
            .map(Ok)
            .collect();
        MockReply::Events(events)
    }
}

/// A provider that replays scripted replies in order and records every request
#[derive(Clone, Default)]
pub struct MockProvider {
    replies: Arc<Mutex<Vec<MockReply>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The message lists sent so far, one per streaming call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        _model: &str,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<EventStream, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| (!replies.is_empty()).then(|| replies.remove(0)));

        match reply {
            Some(MockReply::Events(events)) => Ok(Box::pin(futures::stream::iter(events))),
            Some(MockReply::Error(err)) => Err(err),
            // Return an empty turn if no more replies are scripted
            None => Ok(Box::pin(futures::stream::iter(Vec::new()))),
        }
    }
}
