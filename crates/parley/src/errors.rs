use thiserror::Error;

use crate::providers::errors::TransportError;

/// Failures that end a turn early. Only transport problems qualify; tool failures are
/// reported back to the model as tool results instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("{source}")]
    Transport {
        #[source]
        source: TransportError,
        /// Text streamed before the failure, so the caller can still show it
        partial_text: String,
    },
}

impl TurnError {
    pub fn transport(source: TransportError, partial_text: impl Into<String>) -> Self {
        TurnError::Transport {
            source,
            partial_text: partial_text.into(),
        }
    }

    pub fn partial_text(&self) -> &str {
        match self {
            TurnError::Transport { partial_text, .. } => partial_text,
        }
    }
}

/// Errors raised while executing a tool. The dispatcher renders these into the
/// tool result text; they never leave the tools module as errors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("The {0} tool is not available because it has not been configured")]
    Unavailable(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Request failed: {0}")]
    Http(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No results found for '{0}'")]
    EmptyResult(String),

    #[error("Could not find location '{0}'")]
    LocationNotFound(String),
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest includes the full url in its message, which may carry an api key
        ToolError::Http(err.without_url().to_string())
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
