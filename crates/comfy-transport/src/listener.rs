//! Transport-level listeners.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol::Frame;

/// Receiver of raw frames and the passive-close signal.
pub trait FrameSink: Send + Sync {
    /// Called once per frame, in arrival order.
    fn on_frame(&self, frame: Frame);

    /// Called at most once when the remote side closes the connection.
    fn on_close(&self);
}

/// Detachable slot holding the sink a transport delivers to.
///
/// Transports detach before closing their socket so that a close callback
/// fired afterwards finds nothing to report to.
#[derive(Clone, Default)]
pub struct Listeners {
    sink: Arc<Mutex<Option<Arc<dyn FrameSink>>>>,
}

impl Listeners {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `sink`, replacing any previous one.
    pub fn attach(&self, sink: Arc<dyn FrameSink>) {
        *self.sink.lock() = Some(sink);
    }

    /// Detach the sink. Returns `true` if one was attached.
    pub fn detach(&self) -> bool {
        self.sink.lock().take().is_some()
    }

    /// Whether a sink is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Deliver `frame`. Returns `false` if detached.
    pub fn deliver(&self, frame: Frame) -> bool {
        // Clone out so the sink runs without holding the slot lock.
        let sink = self.sink.lock().clone();
        sink.is_some_and(|sink| {
            sink.on_frame(frame);
            true
        })
    }

    /// Report a passive close and detach. Fires at most once.
    pub fn notify_closed(&self) -> bool {
        let sink = self.sink.lock().take();
        sink.is_some_and(|sink| {
            sink.on_close();
            true
        })
    }
}
