//! Connection lifecycle and protocol state machine for the DG-LAB socket
//! protocol.
//!
//! This is the "just works" layer. Connect to the relay server, receive the
//! assigned client id, bind a target device and send control commands, with
//! heartbeats and inbound dispatch running in the background.
//!
//! ```no_run
//! use dglab_client::{Client, ClientConfig};
//!
//! # async fn demo() -> dglab_client::Result<()> {
//! let client = Client::new(ClientConfig::default().with_ws_url("ws://localhost:9999"));
//! client.set_on_bind(|client_id, target_id| println!("bound {client_id} -> {target_id}"));
//! client.connect().await?;
//! println!("scan: {}", client.qr_content().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handshake;
pub mod heartbeat;
pub mod receiver;
pub mod session;
pub mod state;

pub use blocking::BlockingClient;
pub use client::{Client, QR_CONTENT_PREFIX};
pub use config::{
    ClientConfig, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_RECONNECT_DELAY,
    DEFAULT_WS_URL,
};
pub use dispatcher::Dispatcher;
pub use error::{ClientError, Result};
pub use handshake::await_identity;
pub use state::{ConnectionState, StateEvent};

pub use dglab_codec::{Envelope, MessageType, PulseChannel, StatusCode};
