//! Core connection type
//!
//! [`Connection`] is the single logical connection owned by the background
//! thread. It walks the lifecycle once (resolve, connect, TLS, upgrade), then
//! runs the read loop and the outbound write queue until it is closed or fails.

use super::queue::OutboundQueue;
use super::state::{ConnectionState, StateCell};
use super::tls::{self, TlsConfig};
use super::transport;
use crate::client::Callbacks;
use crate::protocol::constants::{
    CLOSE_GRACE, DEFAULT_HOST, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_WRITE_BUFFER_SIZE,
    DEFAULT_PORT, DEFAULT_TARGET, THREAD_NAME,
};
use crate::protocol::{self, is_expected_close, Inbound, InboundBuffer, WsStream};
use crate::{ConnectionError, Stage};
use futures::future::BoxFuture;
use futures::stream::SplitSink;
use futures::{FutureExt, SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Connection configuration
///
/// Use `ConnectionConfig::builder()` to override the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server host (also used for SNI and the `Host` header)
    pub host: String,
    /// Server port (default: 443)
    pub port: u16,
    /// Resource path of the WebSocket endpoint (default: "/")
    pub target: String,
    /// Largest inbound message accepted (default: 16 MiB)
    pub max_message_size: usize,
    /// Largest outbound backlog the framing layer buffers before a write
    /// fails (default: unbounded)
    pub max_write_buffer_size: usize,
    /// Name given to the background connection thread
    pub thread_name: String,
}

impl ConnectionConfig {
    /// Create configuration for `host` with the default port and target
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            target: DEFAULT_TARGET.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_write_buffer_size: DEFAULT_MAX_WRITE_BUFFER_SIZE,
            thread_name: THREAD_NAME.to_string(),
        }
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use globalchat_wire::connection::ConnectionConfig;
    ///
    /// let config = ConnectionConfig::builder("chat.example.com")
    ///     .port(8443)
    ///     .target("/ws")
    ///     .build();
    /// assert_eq!(config.port, 8443);
    /// ```
    pub fn builder(host: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: Self::new(host),
        }
    }

    /// Parse a `wss://host[:port][/path]` endpoint
    pub fn parse(url: &str) -> crate::Result<Self> {
        Ok(crate::client::Endpoint::parse(url)?.to_config())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

/// Builder for creating `ConnectionConfig`
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the resource path
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.config.target = target.into();
        self
    }

    /// Set the largest inbound message accepted
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.config.max_message_size = bytes;
        self
    }

    /// Set the largest outbound backlog; must exceed 128 KiB
    pub fn max_write_buffer_size(mut self, bytes: usize) -> Self {
        self.config.max_write_buffer_size = bytes;
        self
    }

    /// Set the background thread name
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// Connected flag and lifecycle state, shared between the connection thread
/// and any observer.
#[derive(Debug, Default)]
pub struct ConnectionStatus {
    connected: AtomicBool,
    state: StateCell,
}

impl ConnectionStatus {
    /// Whether the message channel is open
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Clear the connected flag, returning its previous value
    pub(crate) fn take_connected(&self) -> bool {
        self.connected.swap(false, Ordering::AcqRel)
    }
}

/// Work posted to the connection thread
#[derive(Debug)]
pub(crate) enum Command {
    /// Queue a payload for transmission
    Send(String),
    /// Send a normal close frame and stop
    Close,
}

type WsSink = SplitSink<WsStream, Message>;
type WriteInFlight = BoxFuture<'static, (WsSink, Result<(), WsError>)>;

/// Write half of the channel with at most one write in flight.
///
/// A write owns the sink while it runs and hands it back on completion, so the
/// in-flight write survives across iterations of the read/command loop.
struct Writer {
    sink: Option<WsSink>,
    in_flight: Option<WriteInFlight>,
}

impl Writer {
    fn new(sink: WsSink) -> Self {
        Self {
            sink: Some(sink),
            in_flight: None,
        }
    }

    fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn start(&mut self, payload: &str) {
        let Some(mut sink) = self.sink.take() else {
            return;
        };
        let message = Message::Text(payload.to_owned());
        self.in_flight = Some(
            async move {
                let result = sink.send(message).await;
                (sink, result)
            }
            .boxed(),
        );
    }

    async fn completion(&mut self) -> (WsSink, Result<(), WsError>) {
        match self.in_flight.as_mut() {
            Some(write) => write.await,
            None => std::future::pending().await,
        }
    }

    fn finish(&mut self, sink: WsSink) {
        self.in_flight = None;
        self.sink = Some(sink);
    }

    /// Local close. An in-flight write is abandoned along with the sink it
    /// owns; otherwise `frame` is sent, giving the peer at most
    /// [`CLOSE_GRACE`] to accept it.
    async fn close(mut self, frame: Option<CloseFrame<'static>>) {
        if self.in_flight.take().is_some() {
            tracing::debug!("write in flight at close, close frame skipped");
            return;
        }
        let Some(mut sink) = self.sink else {
            return;
        };
        match tokio::time::timeout(CLOSE_GRACE, sink.send(Message::Close(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "close frame not sent"),
            Err(_) => tracing::debug!("peer not reading, close frame abandoned"),
        }
    }

    /// Remote close. Finish the in-flight write, then flush anything the
    /// framing layer queued (the reply to the peer's close frame). Each step
    /// is bounded by [`CLOSE_GRACE`].
    async fn shutdown(mut self) {
        if let Some(write) = self.in_flight.take() {
            match tokio::time::timeout(CLOSE_GRACE, write).await {
                Ok((sink, _)) => self.sink = Some(sink),
                Err(_) => {
                    tracing::debug!("write still in flight after peer close, abandoned");
                    return;
                }
            }
        }
        if let Some(mut sink) = self.sink {
            let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
        }
    }
}

/// How the open channel ended
enum Exit {
    /// Disconnect requested locally
    LocalClose,
    /// Peer closed or the stream ended
    RemoteClosed,
    /// Read or write failure (already reported)
    Failed,
}

/// The single logical connection
pub struct Connection {
    config: ConnectionConfig,
    tls: TlsConfig,
    state: ConnectionState,
    status: Arc<ConnectionStatus>,
}

impl Connection {
    /// Create a connection that will publish its status into `status`
    pub fn new(config: ConnectionConfig, tls: TlsConfig, status: Arc<ConnectionStatus>) -> Self {
        status.state.set(ConnectionState::Idle);
        Self {
            config,
            tls,
            state: ConnectionState::Idle,
            status,
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Configuration this connection was created with
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn transition(&mut self, next: ConnectionState) {
        match self.state.transition(next) {
            Ok(()) => {
                tracing::debug!(state = %next, "state transition");
                self.status.state.set(next);
            }
            Err(e) => tracing::warn!(error = %e, "ignored state transition"),
        }
    }

    /// Drive the whole lifecycle. Returns when the channel is closed or failed.
    pub(crate) async fn run(
        mut self,
        commands: &mut UnboundedReceiver<Command>,
        callbacks: &mut Callbacks,
    ) {
        crate::metrics::counters::connection_attempted();
        let started = Instant::now();

        let ws = tokio::select! {
            result = self.establish() => match result {
                Ok(ws) => ws,
                Err(err) => {
                    self.fail(err, callbacks);
                    return;
                }
            },
            () = wait_for_close(commands) => {
                tracing::info!(
                    state = %self.state,
                    "disconnect requested before the channel opened"
                );
                self.transition(ConnectionState::Closed);
                return;
            }
        };

        crate::metrics::histograms::handshake_duration(started.elapsed());
        self.transition(ConnectionState::Open);
        self.status.set_connected(true);
        crate::metrics::counters::connection_established();
        tracing::info!(path = %self.config.target, "channel open");
        callbacks.connected();

        self.pump(ws, commands, callbacks).await;
    }

    /// Resolve, connect, TLS handshake, WebSocket upgrade.
    async fn establish(&mut self) -> Result<WsStream, ConnectionError> {
        let host = self.config.host.clone();
        let port = self.config.port;

        self.transition(ConnectionState::Resolving);
        let addrs = transport::resolve(&host, port)
            .await
            .map_err(|e| ConnectionError::new(Stage::Resolve, e))?;
        tracing::debug!(count = addrs.len(), "resolved endpoints");

        self.transition(ConnectionState::Connecting);
        let tcp_stream = transport::connect_first(&addrs)
            .await
            .map_err(|e| ConnectionError::new(Stage::Connect, e))?;

        self.transition(ConnectionState::TlsHandshake);
        let server_name =
            tls::server_name(&host).map_err(|e| ConnectionError::new(Stage::SetSni, e))?;
        let tls_stream = transport::tls_handshake(tcp_stream, &self.tls, server_name)
            .await
            .map_err(|e| ConnectionError::new(Stage::SslHandshake, e))?;
        tracing::debug!(anchor = self.tls.anchor_source(), "TLS established");

        self.transition(ConnectionState::ProtocolHandshake);
        protocol::upgrade(
            tls_stream,
            &host,
            port,
            &self.config.target,
            self.config.max_message_size,
            self.config.max_write_buffer_size,
        )
        .await
        .map_err(|e| ConnectionError::new(Stage::Handshake, e))
    }

    /// Steady state: deliver inbound messages, drain the outbound queue.
    async fn pump(
        &mut self,
        ws: WsStream,
        commands: &mut UnboundedReceiver<Command>,
        callbacks: &mut Callbacks,
    ) {
        let (sink, mut stream) = ws.split();
        let mut writer = Writer::new(sink);
        let mut queue = OutboundQueue::new();
        let mut inbound = InboundBuffer::new();

        let exit = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(message)) => match inbound.accept(message) {
                        Inbound::Data => {
                            deliver(&inbound, callbacks);
                            inbound.clear();
                        }
                        Inbound::Control => {}
                        Inbound::Close(frame) => {
                            tracing::info!(?frame, "server closed the channel");
                            break Exit::RemoteClosed;
                        }
                    },
                    Some(Err(e)) if is_expected_close(&e) => {
                        tracing::info!(reason = %e, "channel ended");
                        break Exit::RemoteClosed;
                    }
                    Some(Err(e)) => {
                        self.fail(ConnectionError::new(Stage::Read, e), callbacks);
                        break Exit::Failed;
                    }
                    None => {
                        tracing::info!("channel ended");
                        break Exit::RemoteClosed;
                    }
                },

                command = commands.recv() => match command {
                    Some(Command::Send(payload)) => {
                        if queue.push(payload) {
                            if let Some(head) = queue.front() {
                                writer.start(head);
                            }
                        }
                    }
                    Some(Command::Close) | None => break Exit::LocalClose,
                },

                (sink, result) = writer.completion(), if writer.is_busy() => {
                    writer.finish(sink);
                    match result {
                        Ok(()) => {
                            crate::metrics::counters::message_sent();
                            if let Some(next) = queue.complete() {
                                writer.start(next);
                            }
                        }
                        Err(e) => {
                            let discarded = queue.discard();
                            if discarded > 1 {
                                tracing::debug!(
                                    count = discarded - 1,
                                    "discarding queued payloads"
                                );
                            }
                            crate::metrics::counters::payloads_discarded(discarded);
                            self.fail(ConnectionError::new(Stage::Write, e), callbacks);
                            break Exit::Failed;
                        }
                    }
                }
            }
        };

        self.status.set_connected(false);
        match exit {
            Exit::LocalClose => {
                self.transition(ConnectionState::Closing);
                if !queue.is_empty() {
                    tracing::debug!(count = queue.len(), "closing with payloads still queued");
                }
                writer
                    .close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    }))
                    .await;
                self.transition(ConnectionState::Closed);
                tracing::info!("channel closed");
            }
            Exit::RemoteClosed => {
                writer.shutdown().await;
                self.transition(ConnectionState::Closed);
            }
            Exit::Failed => {}
        }
    }

    /// Report a terminal stage failure.
    fn fail(&mut self, err: ConnectionError, callbacks: &mut Callbacks) {
        tracing::warn!(stage = %err.stage(), detail = err.detail(), "connection failed");
        crate::metrics::counters::connection_failed(err.stage());
        self.status.set_connected(false);
        self.transition(ConnectionState::Failed);
        callbacks.error(&err);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("target", &self.config.target)
            .field("state", &self.state)
            .finish()
    }
}

/// Hand the buffered message to the message handler
fn deliver(inbound: &InboundBuffer, callbacks: &mut Callbacks) {
    match inbound.text() {
        Ok(text) => {
            crate::metrics::counters::message_received();
            callbacks.message(text);
        }
        Err(e) => {
            tracing::warn!(bytes = inbound.len(), error = %e, "discarding non-UTF-8 message");
        }
    }
}

/// Resolves once a close is requested or every sender is gone.
async fn wait_for_close(commands: &mut UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Close => return,
            Command::Send(_) => {
                tracing::debug!("dropping payload posted before the channel opened");
            }
        }
    }
}
