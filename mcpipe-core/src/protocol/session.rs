//! Session management for MCP connections
//!
//! A [`Session`] owns one connection to a peer: the writer half of the
//! transport behind a mutex, a [`Correlator`] for in-flight calls, and a
//! reader task that dispatches every incoming frame.

use super::*;
use crate::config::ClientConfig;
use crate::error::{RemoteError, TransportError};
use crate::transport::{
    FrameReader, FrameWriter, PeerHandle, Transport, TransportStats, TransportStatsSnapshot,
};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};
use uuid::Uuid;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been attempted
    Disconnected,
    /// Transport is up, handshake in progress
    Connecting,
    /// Handshake complete, requests are accepted
    Ready,
    /// Teardown in progress
    Closing,
    /// Connection released; nothing more will happen
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Session state information
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Where the connection is in its lifecycle
    pub connection: ConnectionState,
    /// Information about the connected server
    pub server_info: Option<Implementation>,
    /// Capabilities supported by the server
    pub server_capabilities: Option<ServerCapabilities>,
    /// The protocol version the server answered with
    pub protocol_version: Option<String>,
    /// Usage instructions sent by the server
    pub instructions: Option<String>,
    /// Why the connection ended, once it has
    pub closed_reason: Option<String>,
    /// Timestamp when the connection was established
    pub connected_at: chrono::DateTime<chrono::Utc>,
    /// Timestamp of the last frame sent or received
    pub last_activity: chrono::DateTime<chrono::Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        let now = chrono::Utc::now();
        Self {
            connection: ConnectionState::Disconnected,
            server_info: None,
            server_capabilities: None,
            protocol_version: None,
            instructions: None,
            closed_reason: None,
            connected_at: now,
            last_activity: now,
        }
    }
}

/// Session events
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The handshake completed
    Connected,
    /// The connection ended
    Disconnected {
        /// Why it ended
        reason: String,
    },
    /// The peer sent a notification
    Notification(JsonRpcNotification),
    /// A frame was dropped or the peer reported an uncorrelated error
    Error {
        /// The error message
        error: String,
    },
}

/// State shared between callers and the reader task
struct Shared {
    id: String,
    state: RwLock<SessionState>,
    writer: Mutex<Box<dyn FrameWriter>>,
    peer: Option<Arc<dyn PeerHandle>>,
    correlator: Correlator,
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    request_timeout: Option<Duration>,
    /// How long teardown waits for the writer before killing the peer
    grace: Duration,
}

/// Represents an active MCP session
pub struct Session {
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
    stats: Arc<TransportStats>,
    transport_type: &'static str,
}

impl Session {
    /// Take ownership of a transport and start reading from it.
    ///
    /// The session starts in [`ConnectionState::Connecting`]; call
    /// [`Session::initialize`] to complete the handshake.
    pub fn start(
        transport: Box<dyn Transport>,
        config: &ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let id = Uuid::new_v4().to_string();
        let transport_type = transport.transport_type();
        let stats = transport.stats();
        let peer = transport.peer_handle();
        let (writer, reader) = transport.into_split();
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            id: id.clone(),
            state: RwLock::new(SessionState {
                connection: ConnectionState::Connecting,
                ..SessionState::default()
            }),
            writer: Mutex::new(writer),
            peer,
            correlator: Correlator::new(),
            event_sender,
            request_timeout: config.request_timeout(),
            grace: config.shutdown_grace(),
        });

        let span = info_span!("session", id = %id, transport = transport_type);
        let reader = tokio::spawn(read_loop(shared.clone(), reader).instrument(span));
        debug!(session = %id, transport = transport_type, "session started");

        let session = Self {
            shared,
            reader,
            stats,
            transport_type,
        };
        (session, event_receiver)
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Get session state
    pub async fn state(&self) -> SessionState {
        self.shared.state.read().await.clone()
    }

    /// Current lifecycle state
    pub async fn connection_state(&self) -> ConnectionState {
        self.shared.state.read().await.connection
    }

    /// Name of the underlying transport
    pub fn transport_type(&self) -> &'static str {
        self.transport_type
    }

    /// Frame and byte counters for the underlying transport
    pub fn stats(&self) -> TransportStatsSnapshot {
        self.stats.snapshot()
    }

    /// Default deadline applied by [`Session::request`]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.shared.request_timeout
    }

    /// Number of requests awaiting a response
    pub async fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count().await
    }

    /// Identifiers of requests awaiting a response, oldest first
    pub async fn pending_ids(&self) -> Vec<RequestId> {
        self.shared.correlator.pending_ids().await
    }

    /// Perform the `initialize` handshake.
    ///
    /// Records the server's answer, sends `notifications/initialized` and
    /// moves the session to [`ConnectionState::Ready`]. The protocol version
    /// the server answers with is recorded as-is.
    pub async fn initialize(
        &self,
        client_info: Implementation,
        capabilities: ClientCapabilities,
    ) -> Result<InitializeResponse> {
        let params = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities,
            client_info,
        };
        let response: InitializeResponse = self.request_typed(methods::INITIALIZE, &params).await?;
        if response.protocol_version != PROTOCOL_VERSION {
            debug!(
                requested = PROTOCOL_VERSION,
                answered = %response.protocol_version,
                "server answered with a different protocol version"
            );
        }

        {
            let mut state = self.shared.state.write().await;
            state.server_info = Some(response.server_info.clone());
            state.server_capabilities = Some(response.capabilities.clone());
            state.protocol_version = Some(response.protocol_version.clone());
            state.instructions = response.instructions.clone();
        }

        self.notify(methods::INITIALIZED, None).await?;
        self.mark_ready().await?;

        info!(
            server = %response.server_info.name,
            version = %response.server_info.version,
            "session initialized"
        );
        Ok(response)
    }

    /// Move a connecting session to [`ConnectionState::Ready`] without a
    /// handshake, for peers that do not implement `initialize`.
    pub async fn mark_ready(&self) -> Result<()> {
        {
            let mut state = self.shared.state.write().await;
            match state.connection {
                ConnectionState::Connecting => state.connection = ConnectionState::Ready,
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Closing | ConnectionState::Closed => {
                    return Err(Error::ShuttingDown);
                }
                ConnectionState::Disconnected => return Err(TransportError::NotReady.into()),
            }
        }
        let _ = self.shared.event_sender.send(SessionEvent::Connected);
        Ok(())
    }

    /// Send a request and return its `result`, using the session's default
    /// deadline.
    ///
    /// An error response becomes [`Error::Remote`].
    pub async fn request(&self, method: &str, params: Option<Params>) -> Result<Value> {
        self.request_with_timeout(method, params, self.shared.request_timeout)
            .await
    }

    /// Send a request with an explicit deadline (`None` waits forever)
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Params>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let request = JsonRpcRequest::new(self.shared.correlator.next_id(), method, params);
        let response = self.send_request(request, timeout).await?;
        if let Some(error) = response.error {
            return Err(Error::Remote(error.into()));
        }
        response
            .result
            .ok_or_else(|| Error::schema(format!("{method} response has no result")))
    }

    /// Send a request built from a typed payload and decode the result
    pub async fn request_typed<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let result = self.request(method, Codec::to_params(params)?).await?;
        serde_json::from_value(result)
            .map_err(|e| Error::schema(format!("unexpected {method} result: {e}")))
    }

    /// Send a request and wait for the matching response.
    ///
    /// The request's identifier must not be pending already. The deadline
    /// covers writing the request as well as waiting for the answer. On
    /// timeout the call stops being tracked and [`Error::Timeout`] is
    /// returned. If the request had been written, the peer is told it was
    /// cancelled and other calls are unaffected; if it could not be written,
    /// the peer is not reading and the session is torn down.
    pub async fn send_request(
        &self,
        request: JsonRpcRequest,
        timeout: Option<Duration>,
    ) -> Result<JsonRpcResponse> {
        self.ensure_accepting(&request.method).await?;

        let id = request.id.clone();
        let method = request.method.clone();
        let frame = Codec::encode(&request.into())?;
        let slot = self.shared.correlator.register(id.clone(), &method).await?;

        let sent = AtomicBool::new(false);
        let exchange = async {
            if let Err(e) = self.shared.send_frame(&frame).await {
                self.shared.correlator.forget(&id).await;
                if e.is_terminal() {
                    self.shared
                        .terminate(|| Error::ConnectionClosed, format!("send failed: {e}"))
                        .await;
                }
                return Err(e);
            }
            sent.store(true, Ordering::Release);
            trace!(%id, method = %method, "request sent");
            slot.await
        };

        let Some(limit) = timeout else {
            return exchange.await;
        };
        let outcome = tokio::time::timeout(limit, exchange).await;
        if let Ok(outcome) = outcome {
            return outcome;
        }

        self.shared.correlator.forget(&id).await;
        let timeout_ms = limit.as_millis() as u64;
        if sent.load(Ordering::Acquire) {
            debug!(%id, method = %method, timeout_ms, "request timed out");
            self.shared
                .send_cancelled(&id, Some("timeout".to_string()))
                .await;
        } else {
            warn!(
                %id,
                method = %method,
                timeout_ms,
                "timed out writing request, peer is not reading"
            );
            self.shared.kill_peer().await;
            self.shared
                .terminate(|| Error::ConnectionClosed, "peer stopped reading".to_string())
                .await;
        }
        Err(Error::Timeout)
    }

    /// Send a notification
    pub async fn notify(&self, method: &str, params: Option<Params>) -> Result<()> {
        {
            let connection = self.shared.state.read().await.connection;
            match connection {
                ConnectionState::Connecting | ConnectionState::Ready => {}
                ConnectionState::Closing | ConnectionState::Closed => {
                    return Err(Error::ShuttingDown);
                }
                ConnectionState::Disconnected => return Err(TransportError::NotReady.into()),
            }
        }

        let frame = Codec::encode(&JsonRpcNotification::new(method, params).into())?;
        if let Err(e) = self.shared.send_frame_within(&frame, self.shared.request_timeout).await {
            if e.is_terminal() {
                self.shared
                    .terminate(|| Error::ConnectionClosed, format!("send failed: {e}"))
                    .await;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Cancel an in-flight request.
    ///
    /// The waiting caller gets [`Error::Cancelled`] and the peer receives
    /// `notifications/cancelled`. Fails with [`Error::UnknownIdentifier`]
    /// when nothing is pending under `id`.
    pub async fn cancel(&self, id: &RequestId, reason: Option<String>) -> Result<()> {
        self.shared.correlator.cancel(id).await?;
        self.shared.send_cancelled(id, reason).await;
        Ok(())
    }

    /// Fail requests older than `timeout` with [`Error::Timeout`]
    pub async fn cleanup_expired_requests(&self, timeout: Duration) -> Vec<RequestId> {
        self.shared.correlator.expire(timeout).await
    }

    /// Close the session.
    ///
    /// Pending calls fail with [`Error::ShuttingDown`], the writer is closed
    /// (reaping a spawned peer) and the reader task stops. Calling this again
    /// is harmless.
    pub async fn close(&self) -> Result<()> {
        self.shared
            .terminate(|| Error::ShuttingDown, "closed locally".to_string())
            .await;
        self.reader.abort();
        Ok(())
    }

    async fn ensure_accepting(&self, method: &str) -> Result<()> {
        match self.shared.state.read().await.connection {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Connecting if method == methods::INITIALIZE || method == methods::PING => {
                Ok(())
            }
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                Err(TransportError::NotReady.into())
            }
            ConnectionState::Closing | ConnectionState::Closed => Err(Error::ShuttingDown),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl Shared {
    async fn send_frame(&self, frame: &str) -> Result<()> {
        self.writer.lock().await.send(frame).await?;
        self.touch().await;
        Ok(())
    }

    /// Like [`Shared::send_frame`], but a write that cannot finish in time
    /// means the peer stopped reading: it is killed and the send fails.
    async fn send_frame_within(&self, frame: &str, limit: Option<Duration>) -> Result<()> {
        let Some(limit) = limit else {
            return self.send_frame(frame).await;
        };
        match tokio::time::timeout(limit, self.send_frame(frame)).await {
            Ok(result) => result,
            Err(_) => {
                self.kill_peer().await;
                Err(TransportError::SendFailed("timed out writing frame".to_string()).into())
            }
        }
    }

    async fn kill_peer(&self) {
        let Some(peer) = &self.peer else {
            return;
        };
        if let Err(e) = peer.kill().await {
            warn!("failed to kill peer: {}", e);
        }
    }

    /// Close the writer. A send stuck on a peer that stopped reading holds
    /// the lock, so after `grace` the peer is killed to release it.
    async fn close_writer(&self) {
        let mut writer = match tokio::time::timeout(self.grace, self.writer.lock()).await {
            Ok(writer) => writer,
            Err(_) => {
                warn!("writer is blocked, killing the peer");
                self.kill_peer().await;
                match tokio::time::timeout(self.grace, self.writer.lock()).await {
                    Ok(writer) => writer,
                    Err(_) => {
                        warn!("writer still blocked after killing the peer, abandoning it");
                        return;
                    }
                }
            }
        };
        if let Err(e) = writer.close().await {
            warn!("error while closing transport: {}", e);
        }
    }

    async fn touch(&self) {
        self.state.write().await.last_activity = chrono::Utc::now();
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.event_sender.send(event);
    }

    async fn send_cancelled(&self, id: &RequestId, reason: Option<String>) {
        let notice = CancelledNotification {
            request_id: id.clone(),
            reason,
        };
        let frame = Codec::to_params(&notice).and_then(|params| {
            Codec::encode(&JsonRpcNotification::new(methods::CANCELLED, params).into())
        });
        let result = match frame {
            Ok(frame) => self.send_frame_within(&frame, self.request_timeout).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            debug!(%id, "could not send cancellation notice: {}", e);
            if e.is_terminal() {
                self.terminate(|| Error::ConnectionClosed, format!("send failed: {e}"))
                    .await;
            }
        }
    }

    /// Tear the connection down. Safe to run concurrently and repeatedly.
    async fn terminate<F>(&self, make_error: F, reason: String)
    where
        F: Fn() -> Error,
    {
        {
            let mut state = self.state.write().await;
            if state.connection == ConnectionState::Closed {
                return;
            }
            state.connection = ConnectionState::Closing;
        }

        let failed = self.correlator.shutdown(make_error).await;
        self.close_writer().await;

        let was_closed = {
            let mut state = self.state.write().await;
            let was_closed = state.connection == ConnectionState::Closed;
            state.connection = ConnectionState::Closed;
            if state.closed_reason.is_none() {
                state.closed_reason = Some(reason.clone());
            }
            was_closed
        };
        if !was_closed {
            info!(reason = %reason, failed_calls = failed, "session closed");
            self.emit(SessionEvent::Disconnected { reason });
        }
    }

    async fn dispatch(&self, frame: &str) {
        self.touch().await;
        match Codec::decode(frame) {
            Ok(JsonRpcMessage::Response(response)) => self.handle_response(response).await,
            Ok(JsonRpcMessage::Request(request)) => self.handle_peer_request(request).await,
            Ok(JsonRpcMessage::Notification(notification)) => {
                self.handle_notification(notification)
            }
            Err(err) => {
                warn!(error = %err, "received undecodable frame");
                let routed = match Codec::peek_id(frame) {
                    Some(id) => self.correlator.resolve(&id, Err(err)).await.is_ok(),
                    None => false,
                };
                if !routed {
                    self.emit(SessionEvent::Error {
                        error: format!("dropped undecodable frame: {frame}"),
                    });
                }
            }
        }
    }

    async fn handle_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.clone() else {
            let message = response
                .error
                .as_ref()
                .map(|e| RemoteError::from(e.clone()).to_string())
                .unwrap_or_default();
            warn!(error = %message, "peer reported an error without a request id");
            self.emit(SessionEvent::Error { error: message });
            return;
        };

        if let Err(e) = self.correlator.resolve(&id, Ok(response)).await {
            warn!(%id, "dropping response: {}", e);
        }
    }

    async fn handle_peer_request(&self, request: JsonRpcRequest) {
        let reply = if request.method == methods::PING {
            trace!(id = %request.id, "answering peer ping");
            JsonRpcResponse::success(request.id, Value::Object(Params::new()))
        } else {
            debug!(id = %request.id, method = %request.method, "peer request not supported");
            JsonRpcResponse::failure(
                Some(request.id),
                JsonRpcError::new(error_codes::METHOD_NOT_FOUND, "Method not found"),
            )
        };

        let result = match Codec::encode(&reply.into()) {
            Ok(frame) => self.send_frame_within(&frame, self.request_timeout).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("failed to answer peer request: {}", e);
        }
    }

    fn handle_notification(&self, notification: JsonRpcNotification) {
        if notification.method == methods::LOG_MESSAGE {
            log_peer_message(&notification);
        } else {
            trace!(method = %notification.method, "peer notification");
        }
        self.emit(SessionEvent::Notification(notification));
    }
}

fn log_peer_message(notification: &JsonRpcNotification) {
    let Some(params) = notification.params.clone() else {
        return;
    };
    let message: LoggingNotification = match serde_json::from_value(Value::Object(params)) {
        Ok(message) => message,
        Err(e) => {
            debug!("ignoring malformed log notification: {}", e);
            return;
        }
    };

    let logger = message.logger.as_deref().unwrap_or("server");
    let data = match &message.data {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    match message.level {
        LogLevel::Debug => debug!(target: "mcpipe::peer", logger, "{}", data),
        LogLevel::Info | LogLevel::Notice => info!(target: "mcpipe::peer", logger, "{}", data),
        LogLevel::Warning => warn!(target: "mcpipe::peer", logger, "{}", data),
        LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
            error!(target: "mcpipe::peer", logger, "{}", data)
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: Box<dyn FrameReader>) {
    let reason = loop {
        match reader.receive().await {
            Ok(frame) => shared.dispatch(&frame).await,
            Err(Error::MalformedMessage(reason)) => {
                warn!("dropping unreadable frame: {}", reason);
                shared.emit(SessionEvent::Error { error: reason });
            }
            Err(Error::ConnectionClosed) => {
                debug!("peer closed the connection");
                break "peer closed the connection".to_string();
            }
            Err(e) => {
                error!("transport failure: {}", e);
                break e.to_string();
            }
        }
    };
    shared.terminate(|| Error::ConnectionClosed, reason).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StdioTransport;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, duplex};

    struct Peer {
        lines: Lines<BufReader<DuplexStream>>,
        out: DuplexStream,
    }

    impl Peer {
        async fn next(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn send(&mut self, value: Value) {
            self.send_raw(&value.to_string()).await;
        }

        async fn send_raw(&mut self, line: &str) {
            self.out.write_all(line.as_bytes()).await.unwrap();
            self.out.write_all(b"\n").await.unwrap();
        }
    }

    fn start(config: &ClientConfig) -> (Session, mpsc::UnboundedReceiver<SessionEvent>, Peer) {
        let (client_out, peer_in) = duplex(64 * 1024);
        let (peer_out, client_in) = duplex(64 * 1024);
        let transport = StdioTransport::from_streams(client_in, client_out);
        let (session, events) = Session::start(Box::new(transport), config);
        let peer = Peer {
            lines: BufReader::new(peer_in).lines(),
            out: peer_out,
        };
        (session, events, peer)
    }

    async fn ready(config: &ClientConfig) -> (Session, mpsc::UnboundedReceiver<SessionEvent>, Peer) {
        let (session, events, peer) = start(config);
        session.mark_ready().await.unwrap();
        (session, events, peer)
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let (session, mut events, mut peer) = start(&ClientConfig::default());
        assert_eq!(session.connection_state().await, ConnectionState::Connecting);

        let client = tokio::spawn(async move {
            let response = session
                .initialize(Implementation::default(), ClientCapabilities::default())
                .await
                .unwrap();
            (session, response)
        });

        let init = peer.next().await;
        assert_eq!(init["method"], "initialize");
        assert_eq!(init["id"], 1);
        assert_eq!(init["params"]["protocolVersion"], PROTOCOL_VERSION);
        peer.send(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "test-server", "version": "0.1.0"}
            }
        }))
        .await;

        let initialized = peer.next().await;
        assert_eq!(initialized["method"], "notifications/initialized");
        assert!(initialized.get("id").is_none());

        let (session, response) = client.await.unwrap();
        assert_eq!(response.server_info.name, "test-server");
        let state = session.state().await;
        assert_eq!(state.connection, ConnectionState::Ready);
        assert_eq!(state.protocol_version.as_deref(), Some("2024-11-05"));
        assert!(matches!(events.recv().await, Some(SessionEvent::Connected)));
    }

    #[tokio::test]
    async fn test_requests_refused_before_ready() {
        let (session, _events, _peer) = start(&ClientConfig::default());
        let err = session.request("tools/list", None).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::NotReady)));
    }

    #[tokio::test]
    async fn test_error_response_becomes_remote() {
        let (session, _events, mut peer) = ready(&ClientConfig::default()).await;
        let session = Arc::new(session);

        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.request("nope", None).await })
        };
        let request = peer.next().await;
        peer.send(json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .await;

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err.remote_code(), Some(-32601));
    }

    #[tokio::test]
    async fn test_peer_ping_and_unknown_request() {
        let (session, _events, mut peer) = ready(&ClientConfig::default()).await;

        peer.send(json!({"jsonrpc": "2.0", "id": "p1", "method": "ping"})).await;
        let reply = peer.next().await;
        assert_eq!(reply["id"], "p1");
        assert_eq!(reply["result"], json!({}));

        peer.send(json!({"jsonrpc": "2.0", "id": 7, "method": "sampling/createMessage"}))
            .await;
        let reply = peer.next().await;
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["error"]["code"], error_codes::METHOD_NOT_FOUND);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_notifications_are_forwarded() {
        let (_session, mut events, mut peer) = ready(&ClientConfig::default()).await;
        assert!(matches!(events.recv().await, Some(SessionEvent::Connected)));

        peer.send(json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": {"level": "warning", "data": "disk almost full"}
        }))
        .await;

        match events.recv().await {
            Some(SessionEvent::Notification(notification)) => {
                assert_eq!(notification.method, methods::LOG_MESSAGE);
            }
            other => panic!("expected a notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_sends_cancellation() {
        let config = ClientConfig {
            request_timeout_ms: 50,
            ..ClientConfig::default()
        };
        let (session, _events, mut peer) = ready(&config).await;

        let err = session.request("tools/call", None).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(session.pending_requests().await, 0);

        let request = peer.next().await;
        let cancelled = peer.next().await;
        assert_eq!(cancelled["method"], methods::CANCELLED);
        assert_eq!(cancelled["params"]["requestId"], request["id"]);
        assert_eq!(session.connection_state().await, ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_unread_peer_times_out_the_write() {
        let config = ClientConfig {
            request_timeout_ms: 100,
            ..ClientConfig::default()
        };
        // The peer never reads, so a large request fills the pipe.
        let (session, mut events, _peer) = ready(&config).await;
        let mut params = Params::new();
        params.insert("data".to_string(), json!("x".repeat(1024 * 1024)));

        let started = std::time::Instant::now();
        let call = session.request("tools/call", Some(params));
        let err = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(session.connection_state().await, ConnectionState::Closed);
        assert_eq!(session.pending_requests().await, 0);

        assert!(matches!(events.recv().await, Some(SessionEvent::Connected)));
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::Disconnected { .. })
        ));
        tokio::time::timeout(Duration::from_secs(5), session.close())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_expired_requests() {
        let (session, _events, mut peer) = ready(&ClientConfig::default()).await;
        let session = Arc::new(session);

        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.request_with_timeout("slow", None, None).await })
        };
        let request = peer.next().await;
        let id: RequestId = serde_json::from_value(request["id"].clone()).unwrap();

        assert!(session.cleanup_expired_requests(Duration::from_secs(60)).await.is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let expired = session.cleanup_expired_requests(Duration::from_millis(10)).await;
        assert_eq!(expired, vec![id]);

        assert!(matches!(caller.await.unwrap(), Err(Error::Timeout)));
        assert_eq!(session.pending_requests().await, 0);
        assert_eq!(session.connection_state().await, ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_cancel_releases_caller() {
        let (session, _events, mut peer) = ready(&ClientConfig::default()).await;
        let session = Arc::new(session);

        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.request_with_timeout("slow", None, None).await })
        };
        let request = peer.next().await;
        let id: RequestId = serde_json::from_value(request["id"].clone()).unwrap();

        session.cancel(&id, Some("user".to_string())).await.unwrap();
        assert!(matches!(caller.await.unwrap(), Err(Error::Cancelled)));

        let notice = peer.next().await;
        assert_eq!(notice["params"]["reason"], "user");
        assert!(matches!(
            session.cancel(&id, None).await,
            Err(Error::UnknownIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_peer_eof_fails_pending_calls() {
        let (session, mut events, mut peer) = ready(&ClientConfig::default()).await;
        let session = Arc::new(session);
        let _ = events.recv().await;

        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.request_with_timeout("slow", None, None).await })
        };
        let _ = peer.next().await;
        drop(peer);

        assert!(matches!(caller.await.unwrap(), Err(Error::ConnectionClosed)));
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::Disconnected { .. })
        ));
        assert_eq!(session.connection_state().await, ConnectionState::Closed);
        assert!(matches!(
            session.request("tools/list", None).await,
            Err(Error::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, _events, _peer) = ready(&ClientConfig::default()).await;
        session.close().await.unwrap();
        session.close().await.unwrap();

        let state = session.state().await;
        assert_eq!(state.connection, ConnectionState::Closed);
        assert_eq!(state.closed_reason.as_deref(), Some("closed locally"));
        assert!(matches!(session.notify("x", None).await, Err(Error::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_undecodable_response_reaches_caller() {
        let (session, _events, mut peer) = ready(&ClientConfig::default()).await;
        let session = Arc::new(session);

        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.request_with_timeout("x", None, None).await })
        };
        let request = peer.next().await;
        peer.send_raw(&format!(
            r#"{{"jsonrpc":"2.0","id":{},"result":{{}},"error":{{"code":1,"message":"both"}}}}"#,
            request["id"]
        ))
        .await;

        assert!(matches!(
            caller.await.unwrap(),
            Err(Error::SchemaViolation(_))
        ));
        assert_eq!(session.connection_state().await, ConnectionState::Ready);
    }
}
