//! Duplex transport for ComfyUI realtime sessions.
//!
//! Provides:
//! - Frame model and protocol demultiplexer (tagged JSON envelopes + binary previews)
//! - `Transport` trait and listener detachment
//! - WebSocket client transport (feature: websocket)

pub mod listener;
pub mod protocol;
pub mod transport;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use listener::{FrameSink, Listeners};
pub use protocol::{Demultiplexer, Frame, ProtocolError, decode};
pub use transport::{Transport, TransportError, TransportFactory, TransportState};

#[cfg(feature = "websocket")]
pub use websocket::{WsTransport, WsTransportFactory};
