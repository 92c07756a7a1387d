use std::time::Duration;

use crate::state::{ConnectionState, StateEvent};

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] dglab_transport::TransportError),

    /// Envelope encoding/decoding or command validation error.
    #[error("codec error: {0}")]
    Codec(#[from] dglab_codec::CodecError),

    /// The identity handshake did not complete in time.
    #[error("no client id received within {0:?}")]
    HandshakeTimeout(Duration),

    /// The server closed the connection before assigning a client id.
    #[error("connection closed during handshake")]
    HandshakeClosed,

    /// The server sent an unusable identity assignment.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The operation needs an open connection.
    #[error("not connected")]
    NotConnected,

    /// The event is not valid in the current connection state.
    #[error("illegal transition: {event:?} while {from:?}")]
    IllegalTransition {
        from: ConnectionState,
        event: StateEvent,
    },

    /// The blocking wrapper could not start its runtime.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
