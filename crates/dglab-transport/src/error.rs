/// Errors that can occur in message transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish a connection to the specified address.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Failed to send a message.
    #[error("send failed: {0}")]
    Send(String),

    /// Failed to receive a message.
    #[error("receive failed: {0}")]
    Receive(String),

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been closed, locally or by the remote side.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
