//! WebSocket upgrade over an established TLS stream

use super::constants::{DEFAULT_PORT, SCHEME};
use crate::connection::TlsStream;
use crate::{Error, Result};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::WebSocketStream;

/// Framed message channel over TLS
pub type WsStream = WebSocketStream<TlsStream>;

/// HTTP authority for the upgrade request; the port is omitted when it is the default.
pub fn authority(host: &str, port: u16) -> String {
    let host = if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    if port == DEFAULT_PORT {
        host
    } else {
        format!("{}:{}", host, port)
    }
}

/// Build the upgrade request for `target` on `host`.
///
/// The request carries the `Host`, `Connection`, `Upgrade`,
/// `Sec-WebSocket-Version` and `Sec-WebSocket-Key` headers.
pub fn upgrade_request(host: &str, port: u16, target: &str) -> Result<Request> {
    if !target.starts_with('/') {
        return Err(Error::Config(format!(
            "target must be an absolute path, got '{}'",
            target
        )));
    }
    let url = format!("{}://{}{}", SCHEME, authority(host, port), target);
    Ok(url.as_str().into_client_request()?)
}

/// Framing limits for the channel.
///
/// The write limit must exceed the framing layer's write buffer size.
pub fn channel_config(
    max_message_size: usize,
    max_write_buffer_size: usize,
) -> Result<WebSocketConfig> {
    let mut config = WebSocketConfig::default();
    if max_write_buffer_size <= config.write_buffer_size {
        return Err(Error::Config(format!(
            "max_write_buffer_size must exceed {} bytes, got {}",
            config.write_buffer_size, max_write_buffer_size
        )));
    }
    config.max_message_size = Some(max_message_size);
    config.max_write_buffer_size = max_write_buffer_size;
    Ok(config)
}

/// Upgrade `stream` into a WebSocket channel.
pub async fn upgrade(
    stream: TlsStream,
    host: &str,
    port: u16,
    target: &str,
    max_message_size: usize,
    max_write_buffer_size: usize,
) -> Result<WsStream> {
    let request = upgrade_request(host, port, target)?;
    let config = channel_config(max_message_size, max_write_buffer_size)?;

    let (ws, response) =
        tokio_tungstenite::client_async_with_config(request, stream, Some(config)).await?;
    tracing::debug!(status = %response.status(), "websocket upgrade accepted");
    Ok(ws)
}
