//! Per-channel chat history

use super::message::{ChatMessage, InboundPayload, Snapshot};
use std::collections::{HashMap, VecDeque};

/// Messages kept per channel; older ones are dropped first
pub const MAX_HISTORY_PER_CHANNEL: usize = 150;

/// Channel list, bounded per-channel message history and the selected channel.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    channels: Vec<String>,
    messages: HashMap<String, VecDeque<ChatMessage>>,
    current: Option<String>,
}

impl ChatHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message, trimming the channel to the newest
    /// [`MAX_HISTORY_PER_CHANNEL`] entries.
    ///
    /// A channel seen for the first time is added to the channel list.
    pub fn append(&mut self, channel: &str, message: ChatMessage) {
        if !self.channels.iter().any(|c| c == channel) {
            self.channels.push(channel.to_string());
        }
        let history = self.messages.entry(channel.to_string()).or_default();
        history.push_back(message);
        while history.len() > MAX_HISTORY_PER_CHANNEL {
            history.pop_front();
        }
    }

    /// Replace every channel and message with `snapshot`.
    ///
    /// Selects the first channel when none is selected.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.channels.clear();
        self.messages.clear();

        for (channel, messages) in snapshot.channels {
            let mut history: VecDeque<ChatMessage> = messages.into();
            while history.len() > MAX_HISTORY_PER_CHANNEL {
                history.pop_front();
            }
            self.channels.push(channel.clone());
            self.messages.insert(channel, history);
        }

        if self.current.is_none() {
            self.current = self.channels.first().cloned();
        }
    }

    /// Apply a classified inbound payload
    pub fn apply(&mut self, payload: InboundPayload) {
        match payload {
            InboundPayload::ServerError(error) => {
                tracing::warn!(%error, "server returned an error");
            }
            InboundPayload::Snapshot(snapshot) => {
                tracing::info!(
                    channels = snapshot.channels.len(),
                    skipped = snapshot.skipped,
                    "received all channel histories"
                );
                self.apply_snapshot(snapshot);
            }
            InboundPayload::Chat { channel, message } => self.append(&channel, message),
            InboundPayload::Ignored => {}
        }
    }

    /// Drop all channels and messages; the selected channel is kept.
    pub fn clear(&mut self) {
        self.channels.clear();
        self.messages.clear();
    }

    /// Select a channel. Returns `false` if the channel is unknown.
    pub fn select(&mut self, channel: &str) -> bool {
        if self.channels.iter().any(|c| c == channel) {
            self.current = Some(channel.to_string());
            true
        } else {
            false
        }
    }

    /// Known channels, in the order they were received
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Messages of `channel`, oldest first
    pub fn messages(&self, channel: &str) -> impl Iterator<Item = &ChatMessage> {
        self.messages.get(channel).into_iter().flatten()
    }

    /// Number of messages stored for `channel`
    pub fn len(&self, channel: &str) -> usize {
        self.messages.get(channel).map_or(0, VecDeque::len)
    }

    /// Whether no channel holds any message
    pub fn is_empty(&self) -> bool {
        self.messages.values().all(VecDeque::is_empty)
    }

    /// Selected channel, if any
    pub fn current_channel(&self) -> Option<&str> {
        self.current.as_deref()
    }
}
