//! Error types

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by globalchat-wire
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration (endpoint, hostname, builder misuse)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Trust anchor could not be loaded
    #[error("trust anchor error: {0}")]
    TrustAnchor(String),

    /// TLS handshake or configuration failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// WebSocket framing layer failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload that parsed but violates the chat protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid lifecycle transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state description
        expected: String,
        /// Actual state description
        actual: String,
    },

    /// Operation requires an open connection
    #[error("not connected")]
    NotConnected,

    /// Outbound chat message rejected before sending
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Outbound chat message rejected by the send cooldown
    #[error("send cooldown active for another {}ms", .0.as_millis())]
    Cooldown(Duration),

    /// Connection attempt failed at a specific stage
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Stage of the connection lifecycle an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Loading the trust anchor (before any network I/O)
    TrustAnchor,
    /// DNS resolution
    Resolve,
    /// TCP connect
    Connect,
    /// Setting the TLS server name (SNI)
    SetSni,
    /// TLS handshake
    SslHandshake,
    /// WebSocket upgrade handshake
    Handshake,
    /// Inbound read
    Read,
    /// Outbound write
    Write,
}

impl Stage {
    /// Stable tag used in error reports and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrustAnchor => "trust_anchor",
            Self::Resolve => "resolve",
            Self::Connect => "connect",
            Self::SetSni => "set_sni",
            Self::SslHandshake => "ssl_handshake",
            Self::Handshake => "handshake",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported through the on-error callback: a stage tag plus the
/// underlying error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage}: {detail}")]
pub struct ConnectionError {
    stage: Stage,
    detail: String,
}

impl ConnectionError {
    /// Create a stage error from any displayable cause
    pub fn new(stage: Stage, cause: impl fmt::Display) -> Self {
        Self {
            stage,
            detail: cause.to_string(),
        }
    }

    /// Stage the failure occurred in
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Human-readable detail text
    pub fn detail(&self) -> &str {
        &self.detail
    }
}
