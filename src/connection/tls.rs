//! TLS configuration and trust anchors for the chat connection.
//!
//! The server certificate is always verified. Trust comes from a
//! [`TrustBundle`] supplied by the caller, typically a CA certificate bundled
//! into the binary with `include_bytes!`, never from the system trust store.

use crate::{Error, Result};
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pemfile::Item;
use rustls_pki_types::ServerName;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// ALPN protocol offered during the TLS handshake (the WebSocket upgrade is HTTP/1.1)
const ALPN_HTTP_1_1: &[u8] = b"http/1.1";

/// Longest DNS name accepted for SNI
const MAX_HOSTNAME_LEN: usize = 253;

/// Source of the certificate authority material the server is verified against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustBundle {
    /// PEM bytes compiled into the running module, identified by a resource name.
    ///
    /// ```ignore
    /// let bundle = TrustBundle::embedded("chat-ca", include_bytes!("../certs/ca.pem"));
    /// ```
    Embedded {
        /// Resource name (used in diagnostics)
        name: &'static str,
        /// PEM-encoded certificate(s)
        pem: &'static [u8],
    },
    /// PEM bytes supplied at runtime
    Pem(Vec<u8>),
    /// PEM file packaged next to the binary
    File(PathBuf),
    /// Mozilla root set compiled in by `webpki-roots`
    WebPkiRoots,
}

impl TrustBundle {
    /// Bundle referring to PEM bytes embedded in the binary
    pub fn embedded(name: &'static str, pem: &'static [u8]) -> Self {
        Self::Embedded { name, pem }
    }

    /// Load the bundle into a trust anchor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrustAnchor`] if the resource cannot be read, is not
    /// PEM, or contains no usable certificate.
    pub fn load(&self) -> Result<TrustAnchor> {
        match self {
            Self::Embedded { name, pem } => TrustAnchor::from_pem(pem, name),
            Self::Pem(pem) => TrustAnchor::from_pem(pem, "inline PEM"),
            Self::File(path) => {
                let pem = fs::read(path).map_err(|e| {
                    Error::TrustAnchor(format!(
                        "failed to read CA certificate file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                TrustAnchor::from_pem(&pem, &path.display().to_string())
            }
            Self::WebPkiRoots => {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                Ok(TrustAnchor {
                    source: "webpki-roots".to_string(),
                    roots,
                })
            }
        }
    }
}

impl std::fmt::Display for TrustBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded { name, .. } => write!(f, "embedded:{}", name),
            Self::Pem(_) => write!(f, "inline PEM"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::WebPkiRoots => write!(f, "webpki-roots"),
        }
    }
}

/// Loaded certificate authority material.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    source: String,
    roots: RootCertStore,
}

impl TrustAnchor {
    /// Parse every X.509 certificate out of a PEM blob.
    fn from_pem(pem: &[u8], source: &str) -> Result<Self> {
        let mut reader = std::io::Cursor::new(pem);
        let mut roots = RootCertStore::empty();
        let mut found_certs = 0;

        loop {
            match rustls_pemfile::read_one(&mut reader) {
                Ok(Some(Item::X509Certificate(cert))) => {
                    let (added, _ignored) = roots.add_parsable_certificates(std::iter::once(cert));
                    found_certs += added;
                }
                Ok(Some(_)) => {
                    // Keys and other PEM items are not trust material
                }
                Ok(None) => break,
                Err(_) => {
                    return Err(Error::TrustAnchor(format!(
                        "failed to parse CA certificate from '{}'",
                        source
                    )));
                }
            }
        }

        if found_certs == 0 {
            return Err(Error::TrustAnchor(format!(
                "no valid certificates found in '{}'",
                source
            )));
        }

        Ok(Self {
            source: source.to_string(),
            roots,
        })
    }

    /// Number of trusted roots
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether the anchor holds no roots
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Where the anchor was loaded from
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// TLS configuration for the chat connection.
///
/// Peer verification is mandatory and cannot be disabled.
///
/// # Examples
///
/// ```ignore
/// use globalchat_wire::connection::{TlsConfig, TrustBundle};
///
/// let tls = TlsConfig::builder()
///     .trust_bundle(TrustBundle::embedded("chat-ca", include_bytes!("ca.pem")))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Where the trusted roots came from
    anchor_source: String,
    /// Number of trusted roots
    root_count: usize,
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Start a builder; a trust bundle must be set before `build`
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Build a configuration directly from an already loaded anchor.
    pub fn from_anchor(anchor: TrustAnchor) -> Self {
        let root_count = anchor.len();
        let mut client_config = ClientConfig::builder()
            .with_root_certificates(anchor.roots)
            .with_no_client_auth();
        client_config.alpn_protocols = vec![ALPN_HTTP_1_1.to_vec()];

        Self {
            anchor_source: anchor.source,
            root_count,
            client_config: Arc::new(client_config),
        }
    }

    /// Shared rustls client config handed to the connector
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Where the trusted roots were loaded from.
    pub fn anchor_source(&self) -> &str {
        &self.anchor_source
    }

    /// Number of trusted roots.
    pub fn root_count(&self) -> usize {
        self.root_count
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("anchor_source", &self.anchor_source)
            .field("root_count", &self.root_count)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builds a [`TlsConfig`] from a [`TrustBundle`]
#[derive(Debug, Default)]
pub struct TlsConfigBuilder {
    trust_bundle: Option<TrustBundle>,
}

impl TlsConfigBuilder {
    /// Set the trust bundle the server certificate must chain to.
    pub fn trust_bundle(mut self, bundle: TrustBundle) -> Self {
        self.trust_bundle = Some(bundle);
        self
    }

    /// Load the bundle and compile the client config.
    ///
    /// # Errors
    ///
    /// [`Error::TrustAnchor`] when the bundle is missing, unreadable or holds
    /// no usable certificate.
    pub fn build(self) -> Result<TlsConfig> {
        let bundle = self
            .trust_bundle
            .ok_or_else(|| Error::TrustAnchor("no trust bundle configured".into()))?;
        Ok(TlsConfig::from_anchor(bundle.load()?))
    }
}

/// Normalize the host used for SNI: one trailing dot is dropped and the
/// rest must look like a DNS name or an IP literal.
///
/// # Errors
///
/// [`Error::Config`] for an empty or over-long host, or one with characters
/// outside `[A-Za-z0-9.:-]`.
pub fn parse_server_name(hostname: &str) -> Result<String> {
    let host = hostname.strip_suffix('.').unwrap_or(hostname);
    let charset_ok = host
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b':'));

    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN || !charset_ok {
        return Err(Error::Config(format!("invalid hostname for TLS: '{}'", hostname)));
    }
    Ok(host.to_owned())
}

/// Build the rustls server name used for SNI and certificate hostname checks.
pub fn server_name(hostname: &str) -> Result<ServerName<'static>> {
    let name = parse_server_name(hostname)?;
    ServerName::try_from(name)
        .map_err(|_| Error::Config(format!("invalid hostname for TLS: {}", hostname)))
}
