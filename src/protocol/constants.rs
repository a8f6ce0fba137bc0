//! Chat endpoint and framing constants

/// Production chat service host
pub const DEFAULT_HOST: &str = "purple-oasis-rocket-league-websocket.onrender.com";

/// HTTPS/WSS port
pub const DEFAULT_PORT: u16 = 443;

/// Resource path of the WebSocket endpoint
pub const DEFAULT_TARGET: &str = "/";

/// URL scheme of the message channel
pub const SCHEME: &str = "wss";

/// Largest inbound message accepted by the framing layer (16 MiB).
///
/// Full history snapshots are the largest payloads the service sends.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Initial capacity of the reusable inbound buffer
pub const INBOUND_BUFFER_CAPACITY: usize = 4096;

/// Name of the background connection thread
pub const THREAD_NAME: &str = "globalchat-conn";

/// Largest outbound backlog the framing layer may buffer (default: unbounded)
pub const DEFAULT_MAX_WRITE_BUFFER_SIZE: usize = usize::MAX;

/// How long teardown waits on the peer to accept a close frame or the
/// remainder of an in-flight write
pub const CLOSE_GRACE: std::time::Duration = std::time::Duration::from_secs(1);
