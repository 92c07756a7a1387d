//! Text-message transport abstraction for the DG-LAB socket protocol.
//!
//! Provides a unified interface over persistent, message-oriented connections:
//! - WebSocket (via `tokio-tungstenite`)
//! - In-memory pairs (tests and embedders that bring their own plumbing)
//!
//! This is the lowest layer of the workspace. Framing is provided by the
//! underlying transport: one call to [`MessageTransport::send`] is one message
//! on the wire, with no length prefix.

pub mod error;
pub mod memory;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use memory::{MemoryConnector, MemoryPeer, MemoryTransport};
pub use traits::{Connector, MessageTransport};
pub use websocket::{WebSocketConnector, WebSocketTransport};
