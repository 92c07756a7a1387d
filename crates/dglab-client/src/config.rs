use std::time::Duration;

use dglab_codec::DEFAULT_MAX_MESSAGE_LENGTH;

/// Default relay server address.
pub const DEFAULT_WS_URL: &str = "ws://localhost:9999";
/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
/// Default delay before a caller-driven reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Default bound on the wait for the server-assigned client id.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Client configuration.
///
/// Read by every outbound operation, so changes made through the client's
/// setters apply to the running session (the heartbeat driver picks up a new
/// interval on its next tick).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Relay server address, e.g. `ws://localhost:9999`.
    pub ws_url: String,
    /// Interval between heartbeats.
    pub heartbeat_interval: Duration,
    /// Delay between reconnect attempts. The library never reconnects on its
    /// own; this is read by callers that layer a retry loop over `connect()`.
    pub reconnect_delay: Duration,
    /// Maximum encoded message length in bytes.
    pub max_message_length: usize,
    /// Bound on the wait for the identity assignment after the transport is up.
    pub handshake_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Server address without its scheme, as embedded in pairing tokens.
    pub fn host_path(&self) -> &str {
        let url = self.ws_url.trim();
        let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
        rest.trim_end_matches('/')
    }
}
