//! Outbound message queue

use std::collections::VecDeque;

/// Pending outbound payloads, drained strictly FIFO with one write in flight.
///
/// Only the connection thread touches the queue; other threads hand payloads
/// over through the command channel.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<String>,
}

impl OutboundQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload.
    ///
    /// Returns `true` when the queue was empty before the append, meaning the
    /// caller must start a write for it.
    pub fn push(&mut self, payload: String) -> bool {
        self.pending.push_back(payload);
        self.pending.len() == 1
    }

    /// Payload currently being (or next to be) written
    pub fn front(&self) -> Option<&str> {
        self.pending.front().map(String::as_str)
    }

    /// Remove the head after its write completed.
    ///
    /// Returns the next payload to write, if any.
    pub fn complete(&mut self) -> Option<&str> {
        self.pending.pop_front();
        self.front()
    }

    /// Drop everything still queued, returning how many payloads were discarded
    pub fn discard(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// Number of queued payloads (including the one in flight)
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
