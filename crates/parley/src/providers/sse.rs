//! Server-sent event decoding for the streaming messages endpoint.
//!
//! Turns a raw byte stream into [`StreamEvent`]s. Frames that cannot be decoded are
//! dropped so that one corrupt frame does not end an otherwise healthy stream; read
//! errors from the connection are passed through.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde_json::{Map, Value};

use super::errors::TransportError;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Largest partial line held while waiting for a newline
const MAX_LINE_BUFFER: usize = 16 * 1024 * 1024;

/// One decoded protocol event. The payload is left uninterpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub kind: String,
    pub payload: Map<String, Value>,
}

impl StreamEvent {
    /// Build an event from a JSON object carrying a string `type` field
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(payload) = value else {
            return None;
        };
        let kind = payload.get("type")?.as_str()?.to_string();
        Some(Self { kind, payload })
    }

    /// Look up a nested payload value, e.g. `event.get(&["delta", "text"])`
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.payload.get(*first)?, |value, key| value.get(key))
    }

    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_u32(&self, path: &[&str]) -> Option<u32> {
        self.get(path)
            .and_then(Value::as_u64)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
    }
}

/// How a single line of the stream should be handled
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(StreamEvent),
    Done,
    Skip,
}

/// Classify one line of SSE input
pub fn parse_line(line: &str) -> Frame {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return Frame::Skip;
    };
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data.trim() == DONE_SENTINEL {
        return Frame::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(value) => match StreamEvent::from_value(value) {
            Some(event) => Frame::Event(event),
            None => {
                tracing::trace!(data, "skipping frame without an event type");
                Frame::Skip
            }
        },
        Err(e) => {
            tracing::trace!(data, error = %e, "skipping malformed frame");
            Frame::Skip
        }
    }
}

/// Decode a byte stream into protocol events.
///
/// The returned stream ends when the input ends or the `[DONE]` sentinel arrives.
pub fn events<S>(bytes: S) -> impl Stream<Item = Result<StreamEvent, TransportError>>
where
    S: Stream<Item = Result<Bytes, TransportError>>,
{
    events_with_limit(bytes, MAX_LINE_BUFFER)
}

fn events_with_limit<S>(
    bytes: S,
    limit: usize,
) -> impl Stream<Item = Result<StreamEvent, TransportError>>
where
    S: Stream<Item = Result<Bytes, TransportError>>,
{
    async_stream::try_stream! {
        futures::pin_mut!(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        // Bytes already known to hold no newline
        let mut scanned = 0;

        'read: while let Some(chunk) = bytes.next().await {
            buffer.extend_from_slice(&chunk?);

            // Split on raw newlines so multi-byte characters spanning chunks stay intact
            while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                let pos = scanned + offset;
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                scanned = 0;
                match parse_line(&String::from_utf8_lossy(&line[..pos])) {
                    Frame::Event(event) => yield event,
                    Frame::Done => {
                        buffer.clear();
                        break 'read;
                    }
                    Frame::Skip => {}
                }
            }
            scanned = buffer.len();

            if buffer.len() > limit {
                Err::<(), _>(TransportError::Stream(format!(
                    "stream line exceeded {} bytes without a newline",
                    limit
                )))?;
            }
        }

        // A final line without a trailing newline
        if !buffer.is_empty() {
            if let Frame::Event(event) = parse_line(&String::from_utf8_lossy(&buffer)) {
                yield event;
            }
        }
    }
}
