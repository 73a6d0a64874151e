//! Transport traits.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::listener::FrameSink;

/// Low-level connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// Created, handshake not started.
    #[default]
    Idle,
    /// Handshake in flight.
    Connecting,
    /// Handshake succeeded.
    Open,
    /// Closed by either side, or the handshake failed.
    Closed,
}

/// Transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error("Transport already used (state: {0:?})")]
    NotIdle(TransportState),
}

/// One duplex connection bound to a single URL.
///
/// `Idle -> Connecting -> Open -> Closed`, or `Connecting -> Closed` when
/// the handshake fails.
#[async_trait]
pub trait Transport: Send {
    /// Perform the handshake. Frames are held until [`Transport::start`].
    ///
    /// # Errors
    /// Returns error if the transport is not idle or the handshake fails.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Begin delivering frames to `sink` in arrival order.
    fn start(&mut self, sink: Arc<dyn FrameSink>);

    /// Detach listeners, then close. Safe to call repeatedly.
    fn close(&mut self);

    /// Current state.
    fn state(&self) -> TransportState;
}

/// Creates a fresh [`Transport`] per connection attempt.
pub trait TransportFactory: Send + Sync {
    /// Create an idle transport for `url`.
    fn create(&self, url: Url) -> Box<dyn Transport>;
}
