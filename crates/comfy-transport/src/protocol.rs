//! Wire protocol for the backend event stream.
//!
//! Text frames carry a tagged envelope `{ "type": <tag>, "data": <payload> }`;
//! binary frames carry raw preview image bytes. [`decode`] is the only place
//! that knows the backend's payload shapes.

use std::sync::Arc;

use bytes::Bytes;
use comfy_core::{EventBus, ProgressState, SessionEvent};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::listener::FrameSink;

/// One unit received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw image bytes.
    Binary(Bytes),
    /// Tagged JSON envelope.
    Text(String),
}

/// Protocol error. Always recovered locally by dropping the frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),
    #[error("Invalid {tag} payload: {source}")]
    Payload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    #[serde(default)]
    status: Option<StatusInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusInfo {
    #[serde(default)]
    exec_info: Option<ExecInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecInfo {
    #[serde(default)]
    queue_remaining: u32,
}

#[derive(Debug, Deserialize)]
struct ProgressData {
    value: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct ExecutingData {
    node: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecutionStartData {
    prompt_id: String,
}

fn payload<T: DeserializeOwned>(tag: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload {
        tag: tag.to_string(),
        source,
    })
}

/// Decode one frame into a normalized event.
///
/// Returns `Ok(None)` for envelopes with an unrecognized tag.
///
/// # Errors
/// Returns error if a text frame is not a JSON envelope or a recognized
/// tag carries a payload of the wrong shape.
pub fn decode(frame: Frame) -> Result<Option<SessionEvent>, ProtocolError> {
    let text = match frame {
        Frame::Binary(bytes) => return Ok(Some(SessionEvent::Preview(bytes))),
        Frame::Text(text) => text,
    };

    let Envelope { tag, data } = serde_json::from_str(&text)?;
    let event = match tag.as_str() {
        "status" => {
            let status: Option<StatusData> = payload(&tag, data)?;
            let queue_remaining = status
                .and_then(|s| s.status)
                .and_then(|s| s.exec_info)
                .map_or(0, |e| e.queue_remaining);
            SessionEvent::Status { queue_remaining }
        }
        "progress" => {
            let ProgressData { value, max } = payload(&tag, data)?;
            SessionEvent::Progress(ProgressState::new(value, max))
        }
        "executing" => {
            let ExecutingData { node } = payload(&tag, data)?;
            SessionEvent::Executing { node }
        }
        "execution_start" => {
            let ExecutionStartData { prompt_id } = payload(&tag, data)?;
            SessionEvent::ExecutionStart { prompt_id }
        }
        "execution_success" => SessionEvent::ExecutionSuccess(data),
        "execution_error" => SessionEvent::ExecutionError(data),
        _ => {
            tracing::trace!(%tag, "Ignoring unrecognized message");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

/// Frame sink that decodes frames and republishes them on an [`EventBus`].
#[derive(Clone)]
pub struct Demultiplexer {
    bus: Arc<EventBus>,
}

impl Demultiplexer {
    /// Create a demultiplexer publishing to `bus`.
    #[must_use]
    pub const fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl FrameSink for Demultiplexer {
    fn on_frame(&self, frame: Frame) {
        match decode(frame) {
            Ok(Some(event)) => {
                self.bus.publish(&event);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Dropping frame: {e}"),
        }
    }

    fn on_close(&self) {
        self.bus.publish(&SessionEvent::Disconnected);
    }
}
