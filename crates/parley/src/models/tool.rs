use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool that can be offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema for the tool's input object
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A completed tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Provider assigned id, unique within a turn
    pub id: String,
    /// The name of the tool to execute
    pub name: String,
    /// Always a JSON object
    pub input: Value,
}

impl ToolCall {
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Lenient accessors over a tool's JSON input. A missing key or a value of the wrong
/// type yields the type's default rather than an error.
pub trait ToolInput {
    fn str_arg(&self, key: &str) -> &str;
    fn i64_arg(&self, key: &str) -> i64;
    fn f64_arg(&self, key: &str) -> f64;
    fn bool_arg(&self, key: &str) -> bool;
    fn object_arg(&self, key: &str) -> Option<&Map<String, Value>>;
}

impl ToolInput for Value {
    fn str_arg(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn i64_arg(&self, key: &str) -> i64 {
        self.get(key).and_then(Value::as_i64).unwrap_or_default()
    }

    fn f64_arg(&self, key: &str) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or_default()
    }

    fn bool_arg(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or_default()
    }

    fn object_arg(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }
}
