use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;
use super::tool::ToolCall;

/// The textual outcome of one tool call, paired with the request by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool_use_id: String,
    pub content: String,
}

impl ToolResponse {
    pub fn new<I: Into<String>, C: Into<String>>(tool_use_id: I, content: C) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(String),
    ToolRequest(ToolCall),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_request(&self) -> Option<&ToolCall> {
        match self {
            MessageContent::ToolRequest(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        match self {
            MessageContent::ToolResponse(response) => Some(response),
            _ => None,
        }
    }

    /// The wire representation of this block
    pub fn to_block(&self) -> Value {
        match self {
            MessageContent::Text(text) => serde_json::json!({
                "type": "text",
                "text": text,
            }),
            MessageContent::ToolRequest(call) => serde_json::json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.input,
            }),
            MessageContent::ToolResponse(response) => serde_json::json!({
                "type": "tool_result",
                "tool_use_id": response.tool_use_id,
                "content": response.content,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub content: Vec<MessageContent>,
}

impl Message {
    pub fn user() -> Self {
        Message {
            role: Role::User,
            content: Vec::new(),
        }
    }

    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            content: Vec::new(),
        }
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    pub fn with_tool_request(self, call: ToolCall) -> Self {
        self.with_content(MessageContent::ToolRequest(call))
    }

    pub fn with_tool_response(self, response: ToolResponse) -> Self {
        self.with_content(MessageContent::ToolResponse(response))
    }

    /// Concatenation of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(MessageContent::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_requests(&self) -> impl Iterator<Item = &ToolCall> {
        self.content.iter().filter_map(MessageContent::as_tool_request)
    }

    /// The wire `content` field: a plain string for a lone text block, otherwise the
    /// full block list
    pub fn wire_content(&self) -> Value {
        match self.content.as_slice() {
            [MessageContent::Text(text)] => Value::String(text.clone()),
            blocks => Value::Array(blocks.iter().map(MessageContent::to_block).collect()),
        }
    }
}

/// The simplified form of a turn kept by chat history: role and final text only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

impl HistoryEntry {
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

impl From<&HistoryEntry> for Message {
    fn from(entry: &HistoryEntry) -> Self {
        Message {
            role: entry.role,
            content: vec![MessageContent::text(entry.text.clone())],
        }
    }
}
