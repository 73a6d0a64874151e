//! Derived session state.

use serde::{Deserialize, Serialize};

/// Queue depth reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Jobs still waiting to run.
    pub remaining: u32,
}

/// One progress report. A session holds `Option<ProgressState>`;
/// `None` means nothing is reporting progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub value: f64,
    pub max: f64,
}

impl ProgressState {
    /// Create a progress report.
    #[must_use]
    pub const fn new(value: f64, max: f64) -> Self {
        Self { value, max }
    }

    /// Completed fraction in `0.0..=1.0`, or `None` when `max` is not positive.
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        (self.max > 0.0).then(|| (self.value / self.max).clamp(0.0, 1.0))
    }
}

/// What the backend is currently running for this session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Job id from the latest `execution_start`.
    pub current_job_id: Option<String>,
    /// Node id from the latest `executing`.
    pub executing_node_id: Option<String>,
}

impl ExecutionContext {
    /// Whether a job is in flight.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.current_job_id.is_some()
    }

    /// Forget the current job and node.
    pub fn clear(&mut self) {
        self.current_job_id = None;
        self.executing_node_id = None;
    }
}
