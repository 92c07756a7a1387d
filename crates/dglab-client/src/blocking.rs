//! Synchronous facade over [`Client`].
//!
//! [`BlockingClient`] owns a small multi-threaded tokio runtime that hosts the
//! heartbeat and receive tasks; every method blocks the calling thread until
//! the async operation completes. Do not create, call or drop a
//! `BlockingClient` from inside an async context: blocking on a runtime from
//! within another runtime panics.

use std::time::Duration;

use dglab_codec::{Envelope, StatusCode};
use tokio::runtime::{Builder, Runtime};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::state::ConnectionState;

/// Blocking DG-LAB client.
pub struct BlockingClient {
    client: Client,
    runtime: Runtime,
}

impl BlockingClient {
    /// Create the client and its runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("dglab-client")
            .enable_all()
            .build()?;
        Ok(Self {
            client: Client::new(config),
            runtime,
        })
    }

    pub fn connect(&self) -> Result<()> {
        self.runtime.block_on(self.client.connect())
    }

    pub fn bind_target(&self, target_id: &str) -> bool {
        self.runtime.block_on(self.client.bind_target(target_id))
    }

    pub fn send_strength(&self, channel: u8, mode: u8, value: u16) -> bool {
        self.runtime
            .block_on(self.client.send_strength(channel, mode, value))
    }

    pub fn send_pulse<S: AsRef<str>>(&self, channel: char, frames: &[S]) -> bool {
        self.runtime.block_on(self.client.send_pulse(channel, frames))
    }

    pub fn send_clear_queue(&self, channel: u8) -> bool {
        self.runtime.block_on(self.client.send_clear_queue(channel))
    }

    pub fn send_heartbeat(&self) -> bool {
        self.runtime.block_on(self.client.send_heartbeat())
    }

    /// Block until the current connection's receive loop has stopped.
    pub fn wait_disconnected(&self) {
        self.runtime.block_on(self.client.disconnected());
    }

    pub fn close(&self) {
        self.runtime.block_on(self.client.close());
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn client_id(&self) -> Option<String> {
        self.client.client_id()
    }

    pub fn target_id(&self) -> Option<String> {
        self.client.target_id()
    }

    pub fn pairing_token(&self) -> Option<String> {
        self.client.pairing_token()
    }

    pub fn qr_content(&self) -> Option<String> {
        self.client.qr_content()
    }

    pub fn config(&self) -> ClientConfig {
        self.client.config()
    }

    pub fn set_ws_url(&self, url: impl Into<String>) {
        self.client.set_ws_url(url);
    }

    pub fn set_heartbeat_interval(&self, interval: Duration) {
        self.client.set_heartbeat_interval(interval);
    }

    pub fn set_reconnect_delay(&self, delay: Duration) {
        self.client.set_reconnect_delay(delay);
    }

    pub fn set_max_message_length(&self, max: usize) {
        self.client.set_max_message_length(max);
    }

    pub fn set_handshake_timeout(&self, timeout: Duration) {
        self.client.set_handshake_timeout(timeout);
    }

    /// Handlers run on a runtime worker thread, not the caller's thread.
    pub fn set_on_message<F>(&self, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.client.set_on_message(handler);
    }

    pub fn set_on_bind<F>(&self, handler: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.client.set_on_bind(handler);
    }

    pub fn set_on_error<F>(&self, handler: F)
    where
        F: Fn(StatusCode, &str) + Send + Sync + 'static,
    {
        self.client.set_on_error(handler);
    }
}

impl Drop for BlockingClient {
    fn drop(&mut self) {
        self.runtime.block_on(self.client.close());
    }
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
