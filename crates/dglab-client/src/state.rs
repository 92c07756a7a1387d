//! Connection state machine.
//!
//! ```text
//! Disconnected ──Dial──▶ Connecting ──TransportUp──▶ AwaitingIdentity
//!      ▲                                                   │
//!      │                                          IdentityAssigned
//!   Fail/Break                                             ▼
//!      └──────────────── Ready { bound } ◀──BindConfirmed──┘
//!
//! Close: any state ──▶ Closed
//! ```

use crate::error::{ClientError, Result};

/// Lifecycle state of the client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingIdentity,
    Ready {
        bound: bool,
    },
    Closed,
}

/// Events that drive [`ConnectionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// `connect()` started dialing.
    Dial,
    /// The transport is established.
    TransportUp,
    /// The server assigned a client id.
    IdentityAssigned,
    /// The server confirmed a bind.
    BindConfirmed,
    /// The remote side sent a disconnect instruction.
    Break,
    /// Connection establishment or the handshake failed.
    Fail,
    /// `close()` was called.
    Close,
}

impl ConnectionState {
    /// Compute the state after `event`, or reject the event.
    pub fn transition(self, event: StateEvent) -> Result<ConnectionState> {
        use ConnectionState::*;
        use StateEvent::*;

        let next = match (self, event) {
            (Disconnected | Closed | Ready { .. }, Dial) => Connecting,
            (Connecting, TransportUp) => AwaitingIdentity,
            (AwaitingIdentity, IdentityAssigned) => Ready { bound: false },
            (Ready { .. }, BindConfirmed) => Ready { bound: true },
            (Closed, Break) => Closed,
            (_, Break) => Disconnected,
            (Closed, Fail) => Closed,
            (_, Fail) => Disconnected,
            (_, Close) => Closed,
            (from, event) => return Err(ClientError::IllegalTransition { from, event }),
        };
        Ok(next)
    }

    pub fn is_ready(self) -> bool {
        matches!(self, ConnectionState::Ready { .. })
    }

    pub fn is_bound(self) -> bool {
        matches!(self, ConnectionState::Ready { bound: true })
    }
}
