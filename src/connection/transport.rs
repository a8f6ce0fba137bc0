//! Transport establishment: DNS resolution, TCP connect, TLS handshake.
//!
//! Each function is one stage of the lifecycle; the caller maps failures to
//! the matching [`Stage`](crate::Stage).

use crate::connection::TlsConfig;
use crate::{Error, Result};
use rustls_pki_types::ServerName;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// TLS-encrypted TCP stream the message channel runs over
pub type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Resolve `host:port` into candidate endpoints, in resolver order.
pub async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port)).await?.collect();
    if addrs.is_empty() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses found for {}:{}", host, port),
        )));
    }
    Ok(addrs)
}

/// Connect the first endpoint that accepts.
///
/// Endpoints are tried in order; the error of the last attempt is returned
/// when none succeeds.
pub async fn connect_first(addrs: &[SocketAddr]) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                tracing::debug!(%addr, "tcp connected");
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "tcp connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(match last_err {
        Some(e) => Error::Io(e),
        None => Error::Config("no endpoints to connect to".into()),
    })
}

/// Perform the TLS handshake over an established TCP stream.
pub async fn tls_handshake(
    tcp_stream: TcpStream,
    tls_config: &TlsConfig,
    server_name: ServerName<'static>,
) -> Result<TlsStream> {
    let tls_connector = tokio_rustls::TlsConnector::from(tls_config.client_config());
    tls_connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}
