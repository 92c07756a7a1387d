//! Controller-side client for the DG-LAB socket protocol.
//!
//! A controller connects to a relay server over WebSocket, receives a client
//! id, pairs with a device app (the app scans a QR code carrying the pairing
//! token) and then sends strength, waveform and queue-clear commands.
//!
//! # Crate Structure
//!
//! - [`transport`]: text-message transport abstraction (WebSocket, in-memory)
//! - [`codec`]: JSON envelope codec, command payloads, status codes
//! - [`client`]: connection lifecycle, heartbeats and dispatch (behind the
//!   `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use dglab_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use dglab_codec::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use dglab_client::*;
}
