//! ConnectionManager implementation

use super::Callbacks;
use crate::connection::{
    Command, Connection, ConnectionConfig, ConnectionState, ConnectionStatus, TlsConfig,
    TrustBundle,
};
use crate::{ConnectionError, Error, Result, Stage};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::Instrument;

/// Background thread plus the command channel feeding it
struct Worker {
    commands: UnboundedSender<Command>,
    thread: JoinHandle<()>,
}

impl Worker {
    fn thread_id(&self) -> ThreadId {
        self.thread.thread().id()
    }
}

/// Owns one persistent TLS WebSocket connection driven by a background thread.
///
/// All callbacks fire on that thread. `send`, `disconnect`, `is_connected` and
/// `state` may be called from any thread.
///
/// # Examples
///
/// ```no_run
/// use globalchat_wire::client::{Callbacks, ConnectionManager};
/// use globalchat_wire::connection::{ConnectionConfig, TrustBundle};
///
/// # fn example() -> globalchat_wire::Result<()> {
/// let manager = ConnectionManager::new();
/// let callbacks = Callbacks::new().on_message(|text| println!("{}", text));
///
/// manager.connect(
///     ConnectionConfig::parse("wss://chat.example.com/")?,
///     TrustBundle::WebPkiRoots,
///     callbacks,
/// )?;
/// manager.send(r#"{"hello":"world"}"#);
/// manager.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    status: Arc<ConnectionStatus>,
    worker: Mutex<Option<Worker>>,
    dispatch: tracing::Dispatch,
}

impl ConnectionManager {
    /// Create a manager that logs through the current `tracing` dispatcher
    pub fn new() -> Self {
        Self::with_dispatch(tracing::dispatcher::get_default(|d| d.clone()))
    }

    /// Create a manager whose background thread logs through `dispatch`
    pub fn with_dispatch(dispatch: tracing::Dispatch) -> Self {
        Self {
            status: Arc::new(ConnectionStatus::default()),
            worker: Mutex::new(None),
            dispatch,
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        // The guarded data stays consistent even if a holder panicked
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start the connection on a background thread.
    ///
    /// Returns once the thread is running; the lifecycle proceeds
    /// asynchronously and reports through `callbacks`. Calling `connect` while
    /// a connection is active does nothing.
    ///
    /// # Errors
    ///
    /// A trust bundle that cannot be loaded is reported to the error handler
    /// with stage `trust_anchor` and returned as [`Error::Connection`]; no
    /// network I/O is attempted and no disconnect event follows. Failing to
    /// build the runtime or spawn the thread returns [`Error::Io`].
    pub fn connect(
        &self,
        config: ConnectionConfig,
        trust: TrustBundle,
        mut callbacks: Callbacks,
    ) -> Result<()> {
        let mut worker = self.worker();
        if worker.as_ref().is_some_and(|w| w.thread.is_finished()) {
            if let Some(done) = worker.take() {
                let _ = done.thread.join();
            }
        }
        if worker.is_some() {
            tracing::debug!("connect ignored, connection already active");
            return Ok(());
        }

        let tls = match TlsConfig::builder().trust_bundle(trust).build() {
            Ok(tls) => tls,
            Err(e) => {
                let err = ConnectionError::new(Stage::TrustAnchor, &e);
                tracing::warn!(error = %e, "failed to load trust anchor");
                crate::metrics::counters::connection_failed(Stage::TrustAnchor);
                callbacks.error(&err);
                return Err(Error::Connection(err));
            }
        };
        tracing::debug!(
            anchor = tls.anchor_source(),
            roots = tls.root_count(),
            "trust anchor loaded"
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (commands, mut receiver) = mpsc::unbounded_channel();
        self.status.set_connected(false);
        let (host, port) = (config.host.clone(), config.port);
        let thread_name = config.thread_name.clone();
        let conn = Connection::new(config, tls, Arc::clone(&self.status));
        let dispatch = self.dispatch.clone();

        let thread = thread::Builder::new().name(thread_name).spawn(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                let span = tracing::info_span!("connection", %host, port);
                runtime.block_on(conn.run(&mut receiver, &mut callbacks).instrument(span));
                // Resolver tasks stuck in the blocking pool must not hold teardown
                runtime.shutdown_background();
                drop(receiver);
                tracing::debug!("connection thread exiting");
                callbacks.disconnected();
            })
        })?;

        *worker = Some(Worker { commands, thread });
        Ok(())
    }

    /// Queue `payload` for transmission.
    ///
    /// Silently ignored unless the channel is open.
    pub fn send(&self, payload: impl Into<String>) {
        if !self.status.is_connected() {
            tracing::trace!("send ignored, not connected");
            return;
        }
        if let Some(worker) = self.worker().as_ref() {
            let _ = worker.commands.send(Command::Send(payload.into()));
        }
    }

    /// Close the connection and wait for the background thread to exit.
    ///
    /// Idempotent. When called from a callback it cannot wait for its own
    /// thread; the loop still stops once the callback returns.
    pub fn disconnect(&self) {
        let Some(worker) = self.worker().take() else {
            return;
        };
        self.status.take_connected();
        let _ = worker.commands.send(Command::Close);

        if worker.thread_id() == thread::current().id() {
            tracing::warn!("disconnect called on the connection thread, not joining");
            return;
        }

        drop(worker.commands);
        if worker.thread.join().is_err() {
            tracing::error!("connection thread panicked");
        }
    }

    /// Whether the message channel is open
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .finish()
    }
}
