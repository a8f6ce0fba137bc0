//! Message-channel framing
//!
//! This module handles:
//! * The WebSocket upgrade handshake over TLS
//! * Inbound frame classification and buffering
//! * Endpoint constants

pub mod constants;
mod frame;
mod handshake;

pub use frame::{is_expected_close, Inbound, InboundBuffer};
pub use handshake::{authority, channel_config, upgrade, upgrade_request, WsStream};
