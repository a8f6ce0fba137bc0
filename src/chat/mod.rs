//! Global chat glue
//!
//! Parses the chat server's JSON payloads, keeps per-channel history and
//! builds outbound chat messages on top of a
//! [`ConnectionManager`](crate::client::ConnectionManager).

mod client;
mod history;
mod message;

pub use client::{ChatClient, ChatConfig, DEFAULT_SEND_COOLDOWN};
pub use history::{ChatHistory, MAX_HISTORY_PER_CHANNEL};
pub use message::{
    highest_rank_of, rank_tag, ChatMessage, ChatSender, InboundPayload, OutboundChatMessage,
    Platform, Snapshot, SNAPSHOT_TYPE, UNRANKED,
};
