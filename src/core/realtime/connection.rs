//! One upstream Realtime API connection per chat session.
//!
//! The socket halves are owned by a spawned I/O task that selects over the
//! outbound command channel, the inbound stream and a cancellation token.
//! Callers only touch the channel, so a slow upstream never blocks them.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{
    self, Message,
    client::IntoClientRequest,
    http::HeaderValue,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{ConnectionState, RealtimeError, RealtimeResult, StateCell};
use super::config::RealtimeSettings;
use super::machine::{Action, ProtocolMachine};
use super::messages::{ClientEvent, ServerEvent, SessionConfig};
use crate::core::provider_config::ProviderConfig;
use crate::core::session::SessionDirectory;

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Reason attached to the close frame on a graceful shutdown.
pub const CLOSE_REASON: &str = "Session ended";

/// Builds `<base>?model=<model>`, keeping a model already present in `base`.
pub fn endpoint_url(base: &str, model: &str) -> RealtimeResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid endpoint {base}: {e}")))?;
    if !url.query_pairs().any(|(key, _)| key == "model") {
        url.query_pairs_mut().append_pair("model", model);
    }
    Ok(url)
}

/// Upstream connection for a single session.
pub struct RealtimeConnection {
    session_id: String,
    state: Arc<StateCell>,
    machine: ProtocolMachine,
    outbound: OnceLock<mpsc::Sender<Vec<ClientEvent>>>,
    cancel: CancellationToken,
    /// Fired once the caller that owns the shutdown has finished it.
    closed: CancellationToken,
    io_task: Mutex<Option<JoinHandle<()>>>,
    close_timeout: Duration,
}

impl std::fmt::Debug for RealtimeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConnection")
            .field("session_id", &self.session_id)
            .field("state", &self.state.get())
            .finish()
    }
}

impl RealtimeConnection {
    /// Creates an `Idle` connection. Nothing is dialed until [`open`](Self::open).
    pub fn new(session_id: impl Into<String>, close_timeout: Duration) -> Self {
        let session_id = session_id.into();
        Self {
            machine: ProtocolMachine::new(session_id.clone()),
            session_id,
            state: Arc::new(StateCell::default()),
            outbound: OnceLock::new(),
            cancel: CancellationToken::new(),
            closed: CancellationToken::new(),
            io_task: Mutex::new(None),
            close_timeout,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Open
    }

    /// Dials upstream, sends `session.update` and starts the I/O task.
    ///
    /// Fails if the connection was already opened, the handshake fails or
    /// times out, or `close` ran while the handshake was in flight. On any
    /// failure the connection ends `Closed`.
    pub async fn open(
        &self,
        config: &ProviderConfig,
        settings: &RealtimeSettings,
        directory: Arc<dyn SessionDirectory>,
    ) -> RealtimeResult<()> {
        if !self
            .state
            .transition(ConnectionState::Idle, ConnectionState::Connecting)
        {
            return Err(RealtimeError::SessionError(format!(
                "Connection for session {} is {}",
                self.session_id,
                self.state.get()
            )));
        }

        match self.dial_and_spawn(config, settings, directory).await {
            Ok(()) => {
                info!(session_id = %self.session_id, "Realtime connection open");
                Ok(())
            }
            Err(e) => {
                self.cancel.cancel();
                self.state.close();
                Err(e)
            }
        }
    }

    async fn dial_and_spawn(
        &self,
        config: &ProviderConfig,
        settings: &RealtimeSettings,
        directory: Arc<dyn SessionDirectory>,
    ) -> RealtimeResult<()> {
        let model = config
            .model_name
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&settings.default_model);
        let base = config
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&settings.url);
        let url = endpoint_url(base, model)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid API key: {e}")))?;
        request.headers_mut().insert("Authorization", auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        debug!(session_id = %self.session_id, url = %url.host_str().unwrap_or_default(), model, "Connecting to Realtime API");

        let (ws_stream, _response) =
            tokio::time::timeout(settings.connect_timeout(), tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| {
                    RealtimeError::Timeout(format!(
                        "Handshake exceeded {}s",
                        settings.connect_timeout().as_secs()
                    ))
                })?
                .map_err(|e| match e {
                    tungstenite::Error::Http(response) => RealtimeError::ConnectionFailed(format!(
                        "Upstream rejected handshake with status {}",
                        response.status()
                    )),
                    other => RealtimeError::ConnectionFailed(other.to_string()),
                })?;

        let (mut ws_sink, ws_stream) = ws_stream.split();

        // session.update goes out before anything a caller can enqueue.
        let session = SessionConfig::from_settings(settings);
        for action in self.machine.on_open(&session) {
            if let Action::Send(event) = action {
                let json = serde_json::to_string(&event)
                    .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
                ws_sink
                    .send(Message::Text(json.into()))
                    .await
                    .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;
            }
        }

        let (tx, rx) = mpsc::channel::<Vec<ClientEvent>>(WS_CHANNEL_CAPACITY);
        let _ = self.outbound.set(tx);

        let handle = tokio::spawn(run_io(
            ws_sink,
            ws_stream,
            rx,
            self.machine.clone(),
            directory,
            self.state.clone(),
            self.cancel.clone(),
        ));
        *self.io_task.lock() = Some(handle);

        if !self
            .state
            .transition(ConnectionState::Connecting, ConnectionState::Open)
        {
            return Err(RealtimeError::ConnectionFailed(
                "Connection closed during handshake".to_string(),
            ));
        }
        Ok(())
    }

    async fn send_events(&self, events: Vec<ClientEvent>) -> RealtimeResult<()> {
        if !self.is_connected() {
            return Err(RealtimeError::NotConnected);
        }
        let sender = self.outbound.get().ok_or(RealtimeError::NotConnected)?;
        sender
            .send(events)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    /// Appends one chunk of PCM16 audio to the upstream input buffer.
    pub async fn send_audio(&self, pcm: &[u8]) -> RealtimeResult<()> {
        self.send_events(vec![ClientEvent::audio_append(pcm)]).await
    }

    /// Adds a user text message and asks for a response.
    pub async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        let events = self
            .machine
            .on_user_text(text)
            .into_iter()
            .filter_map(|action| match action {
                Action::Send(event) => Some(event),
                _ => None,
            })
            .collect();
        self.send_events(events).await
    }

    /// Sends a normal close frame and stops the I/O task. Idempotent.
    ///
    /// A call that finds another close in progress returns only after that
    /// close has finished.
    pub async fn close(&self) {
        if !self.state.begin_close() {
            if self.state.get() == ConnectionState::Closing {
                // Bounded in case the owning caller was dropped mid-close.
                let wait = self.close_timeout.saturating_mul(2);
                if tokio::time::timeout(wait, self.closed.cancelled()).await.is_err() {
                    warn!(session_id = %self.session_id, "Concurrent close did not finish in time");
                }
            }
            self.state.close();
            return;
        }

        self.cancel.cancel();
        let handle = self.io_task.lock().take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(self.close_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(session_id = %self.session_id, "I/O task ended abnormally: {}", e),
                Err(_) => {
                    warn!(session_id = %self.session_id, "I/O task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
        self.state.close();
        self.closed.cancel();
        info!(session_id = %self.session_id, "Realtime connection closed");
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns the socket for the lifetime of the connection.
async fn run_io<W, R>(
    mut ws_sink: W,
    mut ws_stream: R,
    mut rx: mpsc::Receiver<Vec<ClientEvent>>,
    machine: ProtocolMachine,
    directory: Arc<dyn SessionDirectory>,
    state: Arc<StateCell>,
    cancel: CancellationToken,
) where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let session_id = machine.session_id().to_string();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: CLOSE_REASON.into(),
                };
                if let Err(e) = ws_sink.send(Message::Close(Some(frame))).await {
                    debug!(session_id = %session_id, "Close frame not sent: {}", e);
                }
                break;
            }

            // Handle outgoing messages
            command = rx.recv() => {
                let Some(events) = command else { break };
                if write_events(&mut ws_sink, &events, &session_id).await.is_err() {
                    break;
                }
            }

            // Handle incoming messages
            incoming = ws_stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let event = match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!(session_id = %session_id, "Failed to parse server event: {}", e);
                                continue;
                            }
                        };
                        if perform(machine.on_event(event), &mut ws_sink, directory.as_ref(), &session_id)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            error!(session_id = %session_id, "Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(session_id = %session_id, ?frame, "WebSocket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(session_id = %session_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(session_id = %session_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    if state.close() == ConnectionState::Open {
        warn!(session_id = %session_id, "Realtime connection lost");
    }
}

async fn write_events<W>(ws_sink: &mut W, events: &[ClientEvent], session_id: &str) -> Result<(), ()>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    for event in events {
        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(e) => {
                error!(session_id, "Failed to serialize {}: {}", event.event_type(), e);
                continue;
            }
        };
        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
            error!(session_id, "Failed to send {}: {}", event.event_type(), e);
            return Err(());
        }
    }
    Ok(())
}

async fn perform<W>(
    actions: Vec<Action>,
    ws_sink: &mut W,
    directory: &dyn SessionDirectory,
    session_id: &str,
) -> Result<(), ()>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    for action in actions {
        if let Action::Send(event) = action {
            write_events(ws_sink, std::slice::from_ref(&event), session_id).await?;
            continue;
        }

        // Resolved per delivery; the session may have gone away.
        let Some(session) = directory.get_session(session_id) else {
            debug!(session_id, "Session gone, dropping delivery");
            continue;
        };
        let channel = &session.channel;
        match action {
            Action::DeliverAudio(chunk) => channel.deliver_audio_chunk(session_id, chunk).await,
            Action::DeliverText(delta) => channel.deliver_text_delta(session_id, &delta).await,
            Action::DeliverResponseComplete => channel.deliver_response_complete(session_id).await,
            Action::DeliverTranscript(text) => channel.deliver_transcript(session_id, &text).await,
            Action::Send(_) => {}
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider_config::{ConfigKind, test_config};
    use crate::core::session::testing::{Delivery, RecordingChannel};
    use crate::core::session::{ChatSession, InMemorySessionDirectory};
    use base64::prelude::*;
    use bytes::Bytes;

    async fn next_event(upstream: &mut mock::MockUpstream) -> serde_json::Value {
        tokio::time::timeout(Duration::from_secs(5), upstream.received.recv())
            .await
            .expect("timed out waiting for client event")
            .expect("mock upstream ended")
    }

    fn directory_with_session() -> (
        Arc<InMemorySessionDirectory>,
        tokio::sync::mpsc::UnboundedReceiver<Delivery>,
    ) {
        let directory = Arc::new(InMemorySessionDirectory::default());
        let (channel, rx) = RecordingChannel::new();
        directory.open_session(ChatSession {
            session_id: "s1".to_string(),
            device_id: "dev-1".to_string(),
            channel,
        });
        (directory, rx)
    }

    async fn open_against(
        upstream: &mock::MockUpstream,
        directory: Arc<InMemorySessionDirectory>,
    ) -> RealtimeConnection {
        let mut config = test_config("u1", ConfigKind::Realtime, "sk-test");
        config.base_url = Some(upstream.url.clone());
        let connection = RealtimeConnection::new("s1", Duration::from_secs(2));
        connection
            .open(&config, &RealtimeSettings::default(), directory)
            .await
            .unwrap();
        connection
    }

    #[test]
    fn test_endpoint_url_adds_model_once() {
        let url = endpoint_url("wss://api.openai.com/v1/realtime", "gpt-4o-realtime-preview").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );

        let url = endpoint_url("wss://proxy.local/rt?model=custom", "ignored").unwrap();
        assert_eq!(url.as_str(), "wss://proxy.local/rt?model=custom");

        assert!(endpoint_url("not a url", "m").is_err());
    }

    #[tokio::test]
    async fn test_sends_before_open_are_rejected() {
        let connection = RealtimeConnection::new("s1", Duration::from_secs(1));
        assert!(matches!(
            connection.send_audio(&[0u8; 4]).await,
            Err(RealtimeError::NotConnected)
        ));
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_open_sends_session_update_with_auth() {
        let mut upstream = mock::spawn().await;
        let (directory, _rx) = directory_with_session();
        let connection = open_against(&upstream, directory).await;

        assert_eq!(connection.state(), ConnectionState::Open);
        let first = next_event(&mut upstream).await;
        assert_eq!(first["type"], "session.update");
        assert_eq!(
            upstream.authorization.lock().as_deref(),
            Some("Bearer sk-test")
        );

        connection.close().await;
    }

    #[tokio::test]
    async fn test_send_text_order_and_close_frame() {
        let mut upstream = mock::spawn().await;
        let (directory, _rx) = directory_with_session();
        let connection = open_against(&upstream, directory).await;
        next_event(&mut upstream).await;

        connection.send_text("hello").await.unwrap();
        assert_eq!(next_event(&mut upstream).await["type"], "conversation.item.create");
        assert_eq!(next_event(&mut upstream).await["type"], "response.create");

        connection.close().await;
        assert_eq!(connection.state(), ConnectionState::Closed);
        let close = tokio::time::timeout(Duration::from_secs(5), upstream.closed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(close, Some((1000, CLOSE_REASON.to_string())));

        // Second close is a no-op.
        connection.close().await;
        assert!(matches!(
            connection.send_text("again").await,
            Err(RealtimeError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_speech_stopped_triggers_commit_and_response() {
        let mut upstream = mock::spawn().await;
        let (directory, _rx) = directory_with_session();
        let connection = open_against(&upstream, directory).await;
        next_event(&mut upstream).await;

        upstream
            .push
            .send(r#"{"type":"input_audio_buffer.speech_stopped","audio_end_ms":900,"item_id":"i1"}"#.to_string())
            .unwrap();

        assert_eq!(next_event(&mut upstream).await["type"], "input_audio_buffer.commit");
        assert_eq!(next_event(&mut upstream).await["type"], "response.create");

        connection.close().await;
    }

    #[tokio::test]
    async fn test_audio_delta_delivered_in_frames() {
        let mut upstream = mock::spawn().await;
        let (directory, mut rx) = directory_with_session();
        let connection = open_against(&upstream, directory).await;
        next_event(&mut upstream).await;

        let pcm: Vec<u8> = (0..4000u32).map(|i| (i % 200) as u8).collect();
        let delta = BASE64_STANDARD.encode(&pcm);
        upstream
            .push
            .send("garbage that is not json".to_string())
            .unwrap();
        upstream
            .push
            .send(format!(r#"{{"type":"response.audio.delta","delta":"{delta}"}}"#))
            .unwrap();
        upstream
            .push
            .send(r#"{"type":"response.done","response":{}}"#.to_string())
            .unwrap();

        let mut received = Vec::new();
        loop {
            let delivery = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if delivery == Delivery::ResponseComplete {
                break;
            }
            received.push(delivery);
        }

        let chunks: Vec<Bytes> = received
            .into_iter()
            .map(|d| match d {
                Delivery::Audio(chunk) => chunk,
                other => panic!("unexpected delivery {other:?}"),
            })
            .collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), pcm);
        assert!(connection.is_connected());

        connection.close().await;
    }

    #[tokio::test]
    async fn test_transport_loss_moves_to_closed() {
        let upstream = mock::spawn().await;
        let (directory, _rx) = directory_with_session();
        let connection = open_against(&upstream, directory).await;

        // The mock drops its socket without a close handshake.
        drop(upstream);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while connection.is_connected() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(matches!(
            connection.send_audio(&[0u8; 2]).await,
            Err(RealtimeError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_connection_open() {
        let mut upstream = mock::spawn().await;
        let (directory, mut rx) = directory_with_session();
        let connection = open_against(&upstream, directory).await;
        next_event(&mut upstream).await;

        upstream
            .push
            .send(r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad item"}}"#.to_string())
            .unwrap();
        upstream
            .push
            .send(r#"{"type":"response.done"}"#.to_string())
            .unwrap();

        // Deliveries are in order, so the error was handled before this.
        let delivery = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery, Delivery::ResponseComplete);
        assert_eq!(connection.state(), ConnectionState::Open);

        connection.send_text("still there?").await.unwrap();
        assert_eq!(next_event(&mut upstream).await["type"], "conversation.item.create");
        assert_eq!(next_event(&mut upstream).await["type"], "response.create");

        connection.close().await;
    }

    #[tokio::test]
    async fn test_close_racing_sends() {
        let mut upstream = mock::spawn().await;
        let (directory, _rx) = directory_with_session();
        let connection = Arc::new(open_against(&upstream, directory).await);
        next_event(&mut upstream).await;

        let mut senders = Vec::new();
        for worker in 0..4usize {
            let connection = connection.clone();
            senders.push(tokio::spawn(async move {
                let mut accepted = 0usize;
                loop {
                    let result = if worker % 2 == 0 {
                        connection.send_audio(&[1u8; 320]).await
                    } else {
                        connection.send_text("hi").await
                    };
                    match result {
                        Ok(()) => accepted += 1,
                        Err(RealtimeError::NotConnected) => return accepted,
                        Err(other) => panic!("unexpected send error: {other}"),
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        connection.close().await;
        assert_eq!(connection.state(), ConnectionState::Closed);

        let mut accepted = 0;
        for sender in senders {
            accepted += sender.await.expect("sender task panicked");
        }

        let close = tokio::time::timeout(Duration::from_secs(5), upstream.closed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(close, Some((1000, CLOSE_REASON.to_string())));

        // Everything upstream saw arrived before the close frame and came from an accepted send.
        let mut seen = 0;
        while let Ok(event) = upstream.received.try_recv() {
            let kind = event["type"].as_str().unwrap_or_default().to_string();
            assert!(
                matches!(
                    kind.as_str(),
                    "input_audio_buffer.append" | "conversation.item.create" | "response.create"
                ),
                "unexpected event {kind}"
            );
            seen += 1;
        }
        assert!(seen <= accepted * 2);
    }

    #[tokio::test]
    async fn test_concurrent_close_waits_for_owner() {
        let mut upstream = mock::spawn().await;
        let (directory, _rx) = directory_with_session();
        let connection = Arc::new(open_against(&upstream, directory).await);
        next_event(&mut upstream).await;

        let owner = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.close().await })
        };
        while connection.state() == ConnectionState::Open {
            tokio::task::yield_now().await;
        }

        connection.close().await;
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.closed.is_cancelled());
        assert!(connection.io_task.lock().is_none());

        owner.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_failure_leaves_closed() {
        let mut config = test_config("u1", ConfigKind::Realtime, "sk-test");
        config.base_url = Some("ws://127.0.0.1:1/v1/realtime".to_string());
        let (directory, _rx) = directory_with_session();

        let connection = RealtimeConnection::new("s1", Duration::from_secs(1));
        let result = connection
            .open(&config, &RealtimeSettings::default(), directory)
            .await;

        assert!(result.is_err());
        assert_eq!(connection.state(), ConnectionState::Closed);
    }
}
