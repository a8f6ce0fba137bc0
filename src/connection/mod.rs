//! Connection management
//!
//! This module handles:
//! * Transport establishment (DNS, TCP, TLS)
//! * Connection lifecycle (upgrade, read loop, outbound queue, close)
//! * State machine enforcement
//! * Trust anchors and TLS configuration

mod conn;
mod queue;
mod state;
mod tls;
mod transport;

pub(crate) use conn::Command;
pub use conn::{Connection, ConnectionConfig, ConnectionConfigBuilder, ConnectionStatus};
pub use queue::OutboundQueue;
pub use state::{ConnectionState, StateCell};
pub use tls::{
    parse_server_name, server_name, TlsConfig, TlsConfigBuilder, TrustAnchor, TrustBundle,
};
pub use transport::{connect_first, resolve, tls_handshake, TlsStream};
