//! ChatClient implementation

use super::history::ChatHistory;
use super::message::{ChatSender, InboundPayload, OutboundChatMessage};
use crate::client::{Callbacks, ConnectionManager};
use crate::connection::{ConnectionConfig, TrustBundle};
use crate::metrics::labels;
use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Minimum spacing between two outbound chat messages
pub const DEFAULT_SEND_COOLDOWN: Duration = Duration::from_secs(1);

/// Chat client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Where to connect
    pub connection: ConnectionConfig,
    /// Minimum spacing between outbound messages (default: 1s)
    pub send_cooldown: Duration,
}

impl ChatConfig {
    /// Configuration for `connection` with the default cooldown
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            send_cooldown: DEFAULT_SEND_COOLDOWN,
        }
    }

    /// Set the send cooldown
    pub fn send_cooldown(mut self, cooldown: Duration) -> Self {
        self.send_cooldown = cooldown;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Parse one inbound payload and apply it to `history`.
fn handle_inbound(history: &Mutex<ChatHistory>, text: &str) {
    match InboundPayload::parse(text) {
        Ok(payload) => {
            if let InboundPayload::Snapshot(snapshot) = &payload {
                for _ in 0..snapshot.skipped {
                    crate::metrics::counters::parse_error(labels::KIND_SNAPSHOT_ENTRY);
                }
            }
            lock(history).apply(payload);
        }
        Err(e) => {
            crate::metrics::counters::parse_error(labels::KIND_PAYLOAD);
            tracing::warn!(error = %e, payload = text, "failed to parse incoming message");
        }
    }
}

/// Global chat client: one connection plus the channel history it feeds.
///
/// # Examples
///
/// ```no_run
/// use globalchat_wire::chat::{ChatClient, ChatConfig, ChatSender, Platform};
/// use globalchat_wire::connection::TrustBundle;
///
/// # fn example() -> globalchat_wire::Result<()> {
/// let client = ChatClient::new(ChatConfig::default());
/// client.start(TrustBundle::WebPkiRoots)?;
///
/// let me = ChatSender::new("alice", Platform::Steam).with_ranks([14, 17]);
/// client.send_chat_message(&me, "general", "hello")?;
///
/// client.with_history(|h| {
///     for m in h.messages("general") {
///         println!("[{}] {}: {}", m.rank_tag(), m.user, m.text);
///     }
/// });
/// client.stop();
/// # Ok(())
/// # }
/// ```
pub struct ChatClient {
    config: ChatConfig,
    manager: ConnectionManager,
    history: Arc<Mutex<ChatHistory>>,
    last_sent: Mutex<Option<Instant>>,
}

impl ChatClient {
    /// Create a client; nothing connects until [`start`](Self::start)
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            manager: ConnectionManager::new(),
            history: Arc::new(Mutex::new(ChatHistory::new())),
            last_sent: Mutex::new(None),
        }
    }

    /// Connect using `trust` to verify the server
    pub fn start(&self, trust: TrustBundle) -> Result<()> {
        let on_message = Arc::clone(&self.history);
        let on_disconnect = Arc::clone(&self.history);

        let callbacks = Callbacks::new()
            .on_connect(|| tracing::info!("connected to chat server"))
            .on_message(move |text| handle_inbound(&on_message, text))
            .on_error(|err| {
                tracing::warn!(stage = %err.stage(), detail = err.detail(), "chat connection error")
            })
            .on_disconnect(move || {
                tracing::info!("disconnected from chat server");
                lock(&on_disconnect).clear();
            });

        self.manager
            .connect(self.config.connection.clone(), trust, callbacks)
    }

    /// Disconnect and wait for the connection thread to exit
    pub fn stop(&self) {
        self.manager.disconnect();
    }

    /// Whether the chat connection is open
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Time left before another message may be sent
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let last = (*lock(&self.last_sent))?;
        self.config
            .send_cooldown
            .checked_sub(last.elapsed())
            .filter(|d| !d.is_zero())
    }

    /// Post `text` to `channel` as `sender`.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] when the connection is not open
    /// * [`Error::InvalidMessage`] for an empty user name or empty text
    /// * [`Error::Cooldown`] within the send cooldown of the previous message
    pub fn send_chat_message(&self, sender: &ChatSender, channel: &str, text: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if sender.user.is_empty() {
            return Err(Error::InvalidMessage("player name is empty".into()));
        }
        if text.is_empty() {
            return Err(Error::InvalidMessage("message text is empty".into()));
        }

        let mut last_sent = lock(&self.last_sent);
        if let Some(last) = *last_sent {
            let elapsed = last.elapsed();
            if elapsed < self.config.send_cooldown {
                return Err(Error::Cooldown(self.config.send_cooldown - elapsed));
            }
        }

        let payload = OutboundChatMessage::new(sender, channel, text).to_json()?;
        self.manager.send(payload);
        *last_sent = Some(Instant::now());
        tracing::info!(%channel, %text, "sent chat message");
        Ok(())
    }

    /// Select the channel shown by renderers
    pub fn select_channel(&self, channel: &str) -> bool {
        lock(&self.history).select(channel)
    }

    /// Read access to the chat history
    pub fn with_history<R>(&self, f: impl FnOnce(&ChatHistory) -> R) -> R {
        f(&lock(&self.history))
    }

    /// Underlying connection manager
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .field("manager", &self.manager)
            .finish()
    }
}
