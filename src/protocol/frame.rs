//! Inbound frame handling

use super::constants::INBOUND_BUFFER_CAPACITY;
use bytes::BytesMut;
use std::io;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::{error::ProtocolError, Error as WsError, Message};

/// What a received WebSocket message means for the read loop
#[derive(Debug, PartialEq)]
pub enum Inbound {
    /// A complete data message is in the buffer
    Data,
    /// Ping/pong or raw frame; nothing to deliver
    Control,
    /// Peer sent a close frame
    Close(Option<CloseFrame<'static>>),
}

/// Reusable accumulation buffer for one inbound message.
///
/// Filled by [`accept`](Self::accept), read through [`text`](Self::text) and
/// emptied with [`clear`](Self::clear) once the message was delivered.
#[derive(Debug)]
pub struct InboundBuffer {
    buf: BytesMut,
}

impl InboundBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INBOUND_BUFFER_CAPACITY),
        }
    }

    /// Classify a received message, copying data payloads into the buffer.
    pub fn accept(&mut self, message: Message) -> Inbound {
        match message {
            Message::Text(text) => {
                self.buf.extend_from_slice(text.as_bytes());
                Inbound::Data
            }
            Message::Binary(data) => {
                self.buf.extend_from_slice(&data);
                Inbound::Data
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
            Message::Close(frame) => Inbound::Close(frame),
        }
    }

    /// Buffered message as UTF-8 text
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.buf)
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer holds no message
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop the delivered message, keeping the allocation
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for InboundBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a read error is a normal end of the channel rather than a failure.
///
/// Covers an already closed connection and the peer dropping the TLS/TCP
/// stream (end-of-stream) without finishing the close handshake.
pub fn is_expected_close(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    #[test]
    fn test_text_is_buffered_until_cleared() {
        let mut buffer = InboundBuffer::new();
        assert_eq!(buffer.accept(Message::Text("hello".into())), Inbound::Data);
        assert_eq!(buffer.text().unwrap(), "hello");

        buffer.clear();
        assert!(buffer.is_empty());

        buffer.accept(Message::Text("next".into()));
        assert_eq!(buffer.text().unwrap(), "next");
    }

    #[test]
    fn test_binary_utf8_is_data() {
        let mut buffer = InboundBuffer::new();
        assert_eq!(
            buffer.accept(Message::Binary(b"{\"a\":1}".to_vec())),
            Inbound::Data
        );
        assert_eq!(buffer.text().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_invalid_utf8_binary() {
        let mut buffer = InboundBuffer::new();
        buffer.accept(Message::Binary(vec![0xff, 0xfe]));
        assert!(buffer.text().is_err());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_control_frames_are_not_buffered() {
        let mut buffer = InboundBuffer::new();
        assert_eq!(buffer.accept(Message::Ping(vec![1])), Inbound::Control);
        assert_eq!(buffer.accept(Message::Pong(vec![])), Inbound::Control);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_close_frame() {
        let mut buffer = InboundBuffer::new();
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        match buffer.accept(Message::Close(Some(frame))) {
            Inbound::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[test]
    fn test_expected_close_errors() {
        assert!(is_expected_close(&WsError::ConnectionClosed));
        assert!(is_expected_close(&WsError::AlreadyClosed));
        assert!(is_expected_close(&WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
        assert!(is_expected_close(&WsError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "eof"
        ))));
    }

    #[test]
    fn test_fatal_read_errors() {
        assert!(!is_expected_close(&WsError::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset"
        ))));
        assert!(!is_expected_close(&WsError::Utf8));
    }
}
