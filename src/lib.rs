//! globalchat-wire: persistent TLS WebSocket client for the Global Chat service
//!
//! A single long-lived `wss://` connection driven by a dedicated background
//! thread, with event callbacks and a thread-safe send queue, plus the chat
//! layer (payload model, per-channel history, outbound messages) on top.
//!
//! ```no_run
//! use globalchat_wire::chat::{ChatClient, ChatConfig};
//! use globalchat_wire::connection::TrustBundle;
//!
//! # fn example() -> globalchat_wire::Result<()> {
//! let client = ChatClient::new(ChatConfig::default());
//! client.start(TrustBundle::File("chat-ca.pem".into()))?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod chat;
pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;

pub use chat::ChatClient;
pub use client::{Callbacks, ConnectionManager};
pub use error::{ConnectionError, Error, Result, Stage};
