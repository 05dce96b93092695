use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::models::message::Message;
use crate::models::tool::Tool;

/// Convert internal messages to the messages API specification
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .filter(|message| !message.content.is_empty())
        .map(|message| {
            json!({
                "role": message.role.as_str(),
                "content": message.wire_content(),
            })
        })
        .collect()
}

/// Convert tools to the messages API specification
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.input_schema,
        }));
    }

    Ok(result)
}

/// Build the streaming request body
pub fn create_request(
    model: &str,
    max_tokens: u32,
    system: &str,
    messages: &[Message],
    tools: &[Tool],
) -> Result<Value> {
    let mut payload = json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": messages_to_anthropic_spec(messages),
        "stream": true,
    });

    let object = payload
        .as_object_mut()
        .ok_or_else(|| anyhow!("request payload is not an object"))?;
    if !system.is_empty() {
        object.insert("system".to_string(), json!(system));
    }
    if !tools.is_empty() {
        object.insert("tools".to_string(), json!(tools_to_anthropic_spec(tools)?));
    }

    Ok(payload)
}
