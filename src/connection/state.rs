//! Connection state machine

use crate::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Created, nothing attempted yet
    Idle = 0,

    /// DNS resolution in progress
    Resolving = 1,

    /// TCP connect in progress
    Connecting = 2,

    /// TLS handshake in progress
    TlsHandshake = 3,

    /// WebSocket upgrade in progress
    ProtocolHandshake = 4,

    /// Message channel established (read loop running)
    Open = 5,

    /// Close requested locally, close frame being sent
    Closing = 6,

    /// Closed normally (local or remote)
    Closed = 7,

    /// Terminal failure at some stage
    Failed = 8,
}

impl ConnectionState {
    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, Connecting)
                | (Connecting, TlsHandshake)
                | (TlsHandshake, ProtocolHandshake)
                | (ProtocolHandshake, Open)
                | (Open, Closing)
                | (Idle | Resolving | Connecting | TlsHandshake | ProtocolHandshake, Failed)
                | (Open | Closing, Failed)
                | (Idle | Resolving | Connecting | TlsHandshake | ProtocolHandshake, Closed)
                | (Open | Closing, Closed)
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }

    /// Whether the lifecycle has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Resolving,
            2 => Self::Connecting,
            3 => Self::TlsHandshake,
            4 => Self::ProtocolHandshake,
            5 => Self::Open,
            6 => Self::Closing,
            7 => Self::Closed,
            _ => Self::Failed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Resolving => write!(f, "resolving"),
            Self::Connecting => write!(f, "connecting"),
            Self::TlsHandshake => write!(f, "tls_handshake"),
            Self::ProtocolHandshake => write!(f, "protocol_handshake"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle state published by the connection thread, readable from any thread.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell holding `state`
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    /// Current state
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Publish a new state
    pub fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ConnectionState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ConnectionState::Idle;
        assert!(state.transition(ConnectionState::Resolving).is_ok());
        assert!(state.transition(ConnectionState::Connecting).is_ok());
        assert!(state.transition(ConnectionState::TlsHandshake).is_ok());
        assert!(state.transition(ConnectionState::ProtocolHandshake).is_ok());
        assert!(state.transition(ConnectionState::Open).is_ok());
        assert!(state.transition(ConnectionState::Closing).is_ok());
        assert!(state.transition(ConnectionState::Closed).is_ok());
    }

    #[test]
    fn test_invalid_transition() {
        let mut state = ConnectionState::Idle;
        assert!(state.transition(ConnectionState::Open).is_err());
        assert_eq!(state, ConnectionState::Idle);
    }

    #[test]
    fn test_cannot_skip_tls() {
        let mut state = ConnectionState::Connecting;
        assert!(state.transition(ConnectionState::ProtocolHandshake).is_err());
    }

    #[test]
    fn test_fail_from_any_live_state() {
        for start in [
            ConnectionState::Idle,
            ConnectionState::Resolving,
            ConnectionState::Connecting,
            ConnectionState::TlsHandshake,
            ConnectionState::ProtocolHandshake,
            ConnectionState::Open,
        ] {
            let mut state = start;
            assert!(state.transition(ConnectionState::Failed).is_ok());
            assert!(state.is_terminal());
        }
    }

    #[test]
    fn test_terminal_states_do_not_reopen() {
        let mut state = ConnectionState::Closed;
        assert!(state.transition(ConnectionState::Resolving).is_err());
        assert!(state.transition(ConnectionState::Failed).is_err());

        let mut state = ConnectionState::Failed;
        assert!(state.transition(ConnectionState::Open).is_err());
        assert!(state.transition(ConnectionState::Closed).is_err());
    }

    #[test]
    fn test_state_cell_round_trips_every_state() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), ConnectionState::Idle);
        for state in [
            ConnectionState::Resolving,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Failed,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::TlsHandshake.to_string(), "tls_handshake");
        assert_eq!(ConnectionState::Open.to_string(), "open");
    }
}
