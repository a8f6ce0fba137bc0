//! Tail the global chat from the terminal
//!
//! Usage:
//!   CHAT_CA_PEM=ca.pem cargo run --example chat_tail -- wss://chat.example.com/ [message]
//!
//! The endpoint defaults to `CHAT_URL`, then to the production service. Without
//! `CHAT_CA_PEM` the server is verified against the webpki root set. When a
//! message is given it is posted to the first channel once history arrives.
//! Stop with Ctrl-C.

use globalchat_wire::chat::{ChatClient, ChatConfig, ChatMessage, ChatSender, Platform};
use globalchat_wire::client::{Callbacks, ConnectionManager};
use globalchat_wire::connection::{ConnectionConfig, TrustBundle};
use std::env;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let url = args.next().or_else(|| env::var("CHAT_URL").ok());
    let message: Option<String> = args.next();

    let connection = match url {
        Some(url) => ConnectionConfig::parse(&url)?,
        None => ConnectionConfig::default(),
    };
    let trust = match env::var_os("CHAT_CA_PEM") {
        Some(path) => TrustBundle::File(path.into()),
        None => TrustBundle::WebPkiRoots,
    };

    if env::var_os("CHAT_RAW").is_some() {
        return tail_raw(connection, trust);
    }

    let client = ChatClient::new(ChatConfig::new(connection));
    client.start(trust)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut ticker = tokio::time::interval(Duration::from_millis(500));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut last_printed: Option<ChatMessage> = None;
        let mut pending = message;
        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = ticker.tick() => {
                    let channel = client.with_history(|h| {
                        let channel = h.current_channel()?.to_string();
                        let messages: Vec<_> = h.messages(&channel).collect();
                        let start = last_printed
                            .as_ref()
                            .and_then(|last| messages.iter().rposition(|m| *m == last))
                            .map_or(0, |i| i + 1);
                        for m in &messages[start..] {
                            println!("#{} [{}] {}: {}", channel, m.rank_tag(), m.user, m.text);
                        }
                        if let Some(newest) = messages.last() {
                            last_printed = Some((*newest).clone());
                        }
                        Some(channel)
                    });

                    if let (Some(channel), Some(text)) = (channel, pending.as_deref()) {
                        let me = ChatSender::new("chat_tail", Platform::Steam);
                        match client.send_chat_message(&me, &channel, text) {
                            Ok(()) => pending = None,
                            Err(e) => tracing::debug!(error = %e, "send deferred"),
                        }
                    }
                }
            }
        }
    });

    client.stop();
    Ok(())
}

/// Print raw payloads straight from the connection manager
fn tail_raw(
    config: ConnectionConfig,
    trust: TrustBundle,
) -> Result<(), Box<dyn std::error::Error>> {
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let callbacks = Callbacks::new()
        .on_connect(|| eprintln!("connected"))
        .on_message(|text| println!("{}", text))
        .on_error(|err| eprintln!("error: {}", err))
        .on_disconnect(move || {
            let _ = done_tx.send(());
        });

    let manager = ConnectionManager::new();
    manager.connect(config, trust, callbacks)?;
    let _ = done_rx.recv();
    Ok(())
}
