use std::future::Future;

use crate::error::Result;

/// A connected, bidirectional text-message stream.
///
/// Implementations must tolerate concurrent use from several tasks: the
/// receive loop and the heartbeat driver share one transport, so `send` must
/// serialize concurrent writers internally.
pub trait MessageTransport: Send + Sync + 'static {
    /// Send one text message.
    fn send(&self, text: String) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next text message.
    ///
    /// Returns `Ok(None)` once the remote side has closed the connection
    /// cleanly. Non-text control traffic is handled internally and never
    /// surfaces here.
    fn recv(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Close the connection. Closing an already-closed transport is a no-op.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Establishes [`MessageTransport`] connections to an address.
pub trait Connector: Send + Sync + 'static {
    /// The transport produced by a successful connection.
    type Transport: MessageTransport;

    /// Connect to `url`.
    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Transport>> + Send;
}
