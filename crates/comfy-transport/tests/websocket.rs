#![cfg(feature = "websocket")]

use std::{sync::Arc, time::Duration};

use comfy_core::ClientConfig;
use comfy_transport::{Frame, FrameSink, Transport, TransportError, TransportState, WsTransport};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpListener, sync::mpsc, time::timeout};
use tokio_test::assert_ok;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use url::Url;

#[derive(Debug, PartialEq, Eq)]
enum Seen {
    Frame(Frame),
    Closed,
}

struct ChannelSink(mpsc::UnboundedSender<Seen>);

impl FrameSink for ChannelSink {
    fn on_frame(&self, frame: Frame) {
        let _ = self.0.send(Seen::Frame(frame));
    }

    fn on_close(&self) {
        let _ = self.0.send(Seen::Closed);
    }
}

/// Accept one client, send `frames`, then either close or wait for the
/// client's close frame (reported on the returned channel).
async fn serve(frames: Vec<Message>, close_after: bool) -> (Url, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        if close_after {
            let _ = ws.close(None).await;
            return;
        }
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                let _ = closed_tx.send(());
                break;
            }
        }
    });

    let url = Url::parse(&format!("ws://{addr}/api-comfy/ws?clientId=alice")).unwrap();
    (url, closed_rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transport")
        .expect("sink channel closed")
}

#[tokio::test]
async fn test_frames_arrive_in_order_then_passive_close() {
    let (url, _closed) = serve(
        vec![
            Message::Text(r#"{"type":"status","data":{}}"#.into()),
            Message::Binary(vec![1, 2, 3]),
            Message::Text(r#"{"type":"progress","data":{"value":1,"max":2}}"#.into()),
        ],
        true,
    )
    .await;

    let mut transport = WsTransport::new(url);
    assert_eq!(transport.state(), TransportState::Idle);
    assert_ok!(transport.connect().await);
    assert_eq!(transport.state(), TransportState::Open);

    let (tx, mut rx) = mpsc::unbounded_channel();
    transport.start(Arc::new(ChannelSink(tx)));

    assert_eq!(
        next(&mut rx).await,
        Seen::Frame(Frame::Text(r#"{"type":"status","data":{}}"#.into()))
    );
    assert_eq!(
        next(&mut rx).await,
        Seen::Frame(Frame::Binary(vec![1, 2, 3].into()))
    );
    assert!(matches!(next(&mut rx).await, Seen::Frame(Frame::Text(_))));
    assert_eq!(next(&mut rx).await, Seen::Closed);
    assert_eq!(transport.state(), TransportState::Closed);

    // Closing after a passive close is still fine and reports nothing.
    transport.close();
    transport.close();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_voluntary_close_is_not_reported() {
    let (url, mut server_saw_close) = serve(Vec::new(), false).await;

    let mut transport = WsTransport::new(url);
    transport.connect().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    transport.start(Arc::new(ChannelSink(tx)));

    transport.close();
    assert_eq!(transport.state(), TransportState::Closed);

    timeout(Duration::from_secs(5), server_saw_close.recv())
        .await
        .expect("server never saw close frame");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_handshake_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/ws?clientId=x")).unwrap();
    let mut transport = WsTransport::new(url);
    let result = transport.connect().await;

    assert!(matches!(result, Err(TransportError::Handshake(_))));
    assert_eq!(transport.state(), TransportState::Closed);
    assert!(matches!(
        transport.connect().await,
        Err(TransportError::NotIdle(TransportState::Closed))
    ));
}

#[tokio::test]
async fn test_secure_url_attempts_tls_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept and hang up without speaking TLS.
    tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    let url = ClientConfig::new(format!("https://{addr}"))
        .socket_url("alice")
        .unwrap();
    assert_eq!(url.scheme(), "wss");

    let mut transport = WsTransport::new(url);
    let Err(TransportError::Handshake(reason)) = transport.connect().await else {
        panic!("handshake against a plain TCP peer must fail");
    };
    assert!(
        !reason.contains("TLS support not compiled in"),
        "wss must be supported by default: {reason}"
    );
    assert_eq!(transport.state(), TransportState::Closed);
}
