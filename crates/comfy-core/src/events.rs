//! Normalized session events.
//!
//! The demultiplexer turns backend frames into these shapes so that nothing
//! downstream depends on the backend's nested wire structure.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProgressState;

/// Tag of a session event, used as the subscription key on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Queue status update.
    Status,
    /// Sampler progress report.
    Progress,
    /// A node started executing (or the backend went idle).
    Executing,
    /// A job started.
    ExecutionStart,
    /// A job finished successfully.
    ExecutionSuccess,
    /// A job failed.
    ExecutionError,
    /// Binary preview frame.
    Preview,
    /// The transport closed without being asked to.
    Disconnected,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Status,
        Self::Progress,
        Self::Executing,
        Self::ExecutionStart,
        Self::ExecutionSuccess,
        Self::ExecutionError,
        Self::Preview,
        Self::Disconnected,
    ];

    /// Wire name of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Progress => "progress",
            Self::Executing => "executing",
            Self::ExecutionStart => "execution_start",
            Self::ExecutionSuccess => "execution_success",
            Self::ExecutionError => "execution_error",
            Self::Preview => "preview",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether this kind ends a job.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ExecutionSuccess | Self::ExecutionError)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized event delivered over the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Number of queued jobs still waiting.
    Status { queue_remaining: u32 },
    /// Progress report, replaces any earlier one.
    Progress(ProgressState),
    /// Node currently executing; `None` means the backend is idle.
    Executing { node: Option<String> },
    /// Job identified by `prompt_id` started.
    ExecutionStart { prompt_id: String },
    /// Backend-defined success payload.
    ExecutionSuccess(Value),
    /// Backend-defined error payload.
    ExecutionError(Value),
    /// Raw preview image bytes.
    Preview(Bytes),
    /// Passive close of the underlying transport.
    Disconnected,
}

impl SessionEvent {
    /// Tag of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Status { .. } => EventKind::Status,
            Self::Progress(_) => EventKind::Progress,
            Self::Executing { .. } => EventKind::Executing,
            Self::ExecutionStart { .. } => EventKind::ExecutionStart,
            Self::ExecutionSuccess(_) => EventKind::ExecutionSuccess,
            Self::ExecutionError(_) => EventKind::ExecutionError,
            Self::Preview(_) => EventKind::Preview,
            Self::Disconnected => EventKind::Disconnected,
        }
    }
}
