//! Realtime API mock accepting a single WebSocket connection

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// Handshake details seen by the mock
#[derive(Debug, Default, Clone)]
pub struct Handshake {
    pub uri: String,
    pub authorization: Option<String>,
    pub openai_beta: Option<String>,
}

pub struct RealtimeMock {
    pub url: String,
    pub handshake: Arc<Mutex<Handshake>>,
    received: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<String>,
    closed: Option<oneshot::Receiver<Option<(u16, String)>>>,
}

impl RealtimeMock {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (push, mut push_rx) = mpsc::unbounded_channel::<String>();
        let (closed_tx, closed) = oneshot::channel();
        let handshake = Arc::new(Mutex::new(Handshake::default()));
        let slot = handshake.clone();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let header = |name: &str| {
                    req.headers()
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string)
                };
                *slot.lock() = Handshake {
                    uri: req.uri().to_string(),
                    authorization: header("authorization"),
                    openai_beta: header("openai-beta"),
                };
                Ok(resp)
            };
            let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                return;
            };
            let (mut sink, mut stream) = ws.split();
            let mut close_info = None;
            loop {
                tokio::select! {
                    pushed = push_rx.recv() => {
                        let Some(text) = pushed else { break };
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                let _ = received_tx.send(value);
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            close_info = frame.map(|f| (u16::from(f.code), f.reason.to_string()));
                            break;
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    }
                }
            }
            let _ = closed_tx.send(close_info);
        });

        Self {
            url: format!("ws://{addr}/v1/realtime"),
            handshake,
            received,
            push,
            closed: Some(closed),
        }
    }

    /// Next client event, failing the test after five seconds.
    pub async fn next_event(&mut self) -> Value {
        timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("timed out waiting for client event")
            .expect("mock connection ended")
    }

    pub async fn next_type(&mut self) -> String {
        self.next_event().await["type"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    pub fn push(&self, event: Value) {
        self.push.send(event.to_string()).unwrap();
    }

    /// Close code and reason the client sent, if any.
    pub async fn close_frame(&mut self) -> Option<(u16, String)> {
        let closed = self.closed.take()?;
        timeout(Duration::from_secs(5), closed).await.ok()?.ok()?
    }
}
