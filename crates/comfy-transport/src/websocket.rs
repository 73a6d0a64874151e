//! WebSocket client transport.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::{net::TcpStream, sync::oneshot};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

use crate::{
    listener::{FrameSink, Listeners},
    protocol::Frame,
    transport::{Transport, TransportError, TransportFactory, TransportState},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for one connection attempt.
pub struct WsTransport {
    url: Url,
    state: Arc<Mutex<TransportState>>,
    listeners: Listeners,
    stream: Option<WsStream>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl WsTransport {
    /// Create an idle transport for `url`.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            state: Arc::new(Mutex::new(TransportState::Idle)),
            listeners: Listeners::new(),
            stream: None,
            shutdown_tx: None,
        }
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock() = state;
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let state = self.state();
        if state != TransportState::Idle {
            return Err(TransportError::NotIdle(state));
        }

        self.set_state(TransportState::Connecting);
        tracing::info!("WebSocket connecting to {}", self.url);

        match connect_async(self.url.as_str()).await {
            Ok((stream, _response)) => {
                self.stream = Some(stream);
                self.set_state(TransportState::Open);
                tracing::info!("WebSocket connection established");
                Ok(())
            }
            Err(e) => {
                self.set_state(TransportState::Closed);
                Err(TransportError::Handshake(e.to_string()))
            }
        }
    }

    fn start(&mut self, sink: Arc<dyn FrameSink>) {
        let Some(stream) = self.stream.take() else {
            tracing::warn!("WebSocket start called without an open connection");
            return;
        };

        self.listeners.attach(sink);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);
        tokio::spawn(read_loop(
            stream,
            self.listeners.clone(),
            Arc::clone(&self.state),
            shutdown_rx,
        ));
    }

    fn close(&mut self) {
        self.listeners.detach();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.stream = None;

        let previous = std::mem::replace(&mut *self.state.lock(), TransportState::Closed);
        if previous == TransportState::Open {
            tracing::info!("WebSocket closed");
        }
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(
    stream: WsStream,
    listeners: Listeners,
    state: Arc<Mutex<TransportState>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let (mut sender, mut receiver) = stream.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        listeners.deliver(Frame::Binary(Bytes::from(data)));
                    }
                    Some(Ok(Message::Text(text))) => {
                        listeners.deliver(Frame::Text(text));
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {e}");
                        break;
                    }
                }
            }
            _ = &mut shutdown_rx => {
                if let Err(e) = sender.send(Message::Close(None)).await {
                    tracing::debug!("Failed to send close frame: {e}");
                }
                return;
            }
        }
    }

    *state.lock() = TransportState::Closed;
    if listeners.notify_closed() {
        tracing::info!("WebSocket closed by remote");
    }
}

/// Factory producing [`WsTransport`]s.
#[derive(Debug, Default, Clone)]
pub struct WsTransportFactory;

impl TransportFactory for WsTransportFactory {
    fn create(&self, url: Url) -> Box<dyn Transport> {
        Box::new(WsTransport::new(url))
    }
}
