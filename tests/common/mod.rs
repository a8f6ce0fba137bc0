//! In-process TLS WebSocket server used by the integration tests.
//!
//! Certificates come from a throwaway CA generated with rcgen; the CA PEM is
//! handed to the client as its trust bundle.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use globalchat_wire::client::Callbacks;
use globalchat_wire::ConnectionError;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::Message;

/// How long tests wait for an expected event
pub const WAIT: Duration = Duration::from_secs(10);

/// Certificate authority plus a `localhost` leaf it signed
pub struct TestPki {
    /// CA certificate, PEM
    pub ca_pem: String,
    leaf_der: CertificateDer<'static>,
    leaf_key: Vec<u8>,
}

impl TestPki {
    pub fn generate() -> Self {
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "globalchat test ca");
        let ca_key = KeyPair::generate().unwrap();
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let leaf_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let leaf_key = KeyPair::generate().unwrap();
        let leaf_cert = leaf_params.signed_by(&leaf_key, &ca_cert, &ca_key).unwrap();

        Self {
            ca_pem: ca_cert.pem(),
            leaf_der: leaf_cert.der().clone(),
            leaf_key: leaf_key.serialize_der(),
        }
    }

    fn acceptor(&self) -> TlsAcceptor {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.leaf_key.clone()));
        let mut config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![self.leaf_der.clone()], key)
            .unwrap();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        TlsAcceptor::from(Arc::new(config))
    }
}

/// Something the server does right after the upgrade
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a text message
    Text(String),
    /// Send a binary message
    Binary(Vec<u8>),
    /// Send a ping
    Ping,
    /// Send a close frame and stop
    Close,
}

/// Server behaviour for every accepted connection
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Answer the upgrade request with HTTP 404
    pub reject_upgrade: bool,
    /// Actions performed once the channel is open
    pub on_open: Vec<Action>,
    /// Close the channel after this many text messages were received
    pub close_after: Option<usize>,
    /// Stop reading once the `on_open` actions ran, keeping the socket open
    pub stop_reading: bool,
}

/// What the server observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Upgrade completed
    Opened,
    /// Text message received
    Received(String),
    /// Client sent a close frame with this code
    ClientClosed(Option<u16>),
}

/// TLS WebSocket server on 127.0.0.1 with an ephemeral port
pub struct TestServer {
    pub port: u16,
    pub pki: Arc<TestPki>,
    events: Arc<Mutex<Vec<ServerEvent>>>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl TestServer {
    pub fn start(script: Script) -> Self {
        Self::start_with(Arc::new(TestPki::generate()), script)
    }

    pub fn start_with(pki: Arc<TestPki>, script: Script) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let events = Arc::new(Mutex::new(Vec::new()));
        let acceptor = pki.acceptor();

        let server_events = events.clone();
        runtime.spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let acceptor = acceptor.clone();
                let script = script.clone();
                let events = server_events.clone();
                tokio::spawn(async move {
                    if let Ok(tls) = acceptor.accept(socket).await {
                        serve(tls, script, events).await;
                    }
                });
            }
        });

        Self {
            port,
            pki,
            events,
            runtime: Some(runtime),
        }
    }

    /// Trust bundle holding the CA that signed this server's certificate
    pub fn trust(&self) -> globalchat_wire::connection::TrustBundle {
        globalchat_wire::connection::TrustBundle::Pem(self.pki.ca_pem.clone().into_bytes())
    }

    /// Client configuration pointing at this server
    pub fn config(&self) -> globalchat_wire::connection::ConnectionConfig {
        self.config_builder().build()
    }

    /// Client configuration builder pointing at this server
    pub fn config_builder(&self) -> globalchat_wire::connection::ConnectionConfigBuilder {
        globalchat_wire::connection::ConnectionConfig::builder("localhost").port(self.port)
    }

    pub fn events(&self) -> Vec<ServerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::Received(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Poll until `pred` holds for the observed events
    pub fn wait_for(&self, pred: impl Fn(&[ServerEvent]) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if pred(&self.events.lock().unwrap()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn serve(
    mut tls: tokio_rustls::server::TlsStream<tokio::net::TcpStream>,
    script: Script,
    events: Arc<Mutex<Vec<ServerEvent>>>,
) {
    if script.reject_upgrade {
        let mut buf = [0u8; 4096];
        let _ = tls.read(&mut buf).await;
        let _ = tls
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
        let _ = tls.shutdown().await;
        return;
    }

    let Ok(mut ws) = tokio_tungstenite::accept_async(tls).await else {
        return;
    };
    events.lock().unwrap().push(ServerEvent::Opened);

    for action in script.on_open {
        let message = match action {
            Action::Text(text) => Message::Text(text),
            Action::Binary(bytes) => Message::Binary(bytes),
            Action::Ping => Message::Ping(b"ping".to_vec()),
            Action::Close => {
                let _ = ws.close(None).await;
                drain(&mut ws, &events).await;
                return;
            }
        };
        if ws.send(message).await.is_err() {
            return;
        }
    }

    if script.stop_reading {
        let _held = ws;
        std::future::pending::<()>().await;
        return;
    }

    let mut received = 0;
    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => {
                events.lock().unwrap().push(ServerEvent::Received(text));
                received += 1;
                if script.close_after == Some(received) {
                    let _ = ws.close(None).await;
                    drain(&mut ws, &events).await;
                    return;
                }
            }
            Message::Close(frame) => {
                events
                    .lock()
                    .unwrap()
                    .push(ServerEvent::ClientClosed(frame.map(|f| u16::from(f.code))));
                break;
            }
            _ => {}
        }
    }
}

/// Read until the close handshake finishes
async fn drain<S>(ws: &mut tokio_tungstenite::WebSocketStream<S>, events: &Mutex<Vec<ServerEvent>>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => events.lock().unwrap().push(ServerEvent::Received(text)),
            Message::Close(frame) => events
                .lock()
                .unwrap()
                .push(ServerEvent::ClientClosed(frame.map(|f| u16::from(f.code)))),
            _ => {}
        }
    }
}

/// Callback events as seen by a test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Message(String),
    Error(ConnectionError),
    Disconnect,
}

/// Callbacks forwarding every event into a channel
pub fn recording_callbacks() -> (Callbacks, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel();
    let (c, m, e, d) = (tx.clone(), tx.clone(), tx.clone(), tx);
    let callbacks = Callbacks::new()
        .on_connect(move || {
            let _ = c.send(Event::Connect);
        })
        .on_message(move |text| {
            let _ = m.send(Event::Message(text.to_string()));
        })
        .on_error(move |err| {
            let _ = e.send(Event::Error(err.clone()));
        })
        .on_disconnect(move || {
            let _ = d.send(Event::Disconnect);
        });
    (callbacks, rx)
}

/// Next event, failing the test on timeout
pub fn next_event(rx: &mpsc::Receiver<Event>) -> Event {
    rx.recv_timeout(WAIT).expect("timed out waiting for event")
}

/// Collect events until (and including) `Disconnect`
pub fn events_until_disconnect(rx: &mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx);
        let done = event == Event::Disconnect;
        events.push(event);
        if done {
            return events;
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
