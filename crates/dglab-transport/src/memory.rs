//! In-memory transport pair.
//!
//! [`MemoryTransport::pair`] returns a client-side transport and the
//! [`MemoryPeer`] that plays the remote side. Messages are delivered in order;
//! dropping or closing either side ends the conversation like a closed socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::error::{Result, TransportError};
use crate::traits::{Connector, MessageTransport};

/// Client half of an in-memory connection.
pub struct MemoryTransport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    closed: AtomicBool,
}

/// Remote half of an in-memory connection.
pub struct MemoryPeer {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    /// Create a connected transport/peer pair.
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let (to_peer, from_client) = mpsc::unbounded_channel();
        let (to_client, from_peer) = mpsc::unbounded_channel();
        (
            MemoryTransport {
                outbound: to_peer,
                inbound: AsyncMutex::new(from_peer),
                closed: AtomicBool::new(false),
            },
            MemoryPeer {
                to_client: Some(to_client),
                from_client,
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl MessageTransport for MemoryTransport {
    async fn send(&self, text: String) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Result<Option<String>> {
        if self.is_closed() {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        Ok(inbound.recv().await)
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // Wake a pending `recv` so the owning task can observe the close.
            if let Ok(mut inbound) = self.inbound.try_lock() {
                inbound.close();
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl MemoryPeer {
    /// Deliver a text message to the client.
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        self.to_client
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(text.into())
            .map_err(|_| TransportError::Closed)
    }

    /// Wait for the next message sent by the client.
    ///
    /// Returns `None` once the client transport is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Take a message the client already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Close the remote side; the client's next `recv` yields `Ok(None)`.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

impl std::fmt::Debug for MemoryPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPeer")
            .field("open", &self.to_client.is_some())
            .finish()
    }
}

/// Hands out queued [`MemoryTransport`]s, one per `connect` call.
///
/// An empty queue behaves like a refused connection.
#[derive(Default)]
pub struct MemoryConnector {
    pending: Mutex<VecDeque<MemoryTransport>>,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transport for the next `connect` call.
    pub fn push(&self, transport: MemoryTransport) {
        self.lock_pending().push_back(transport);
    }

    /// Create a pair, queue the client half and return the peer half.
    pub fn accept_next(&self) -> MemoryPeer {
        let (transport, peer) = MemoryTransport::pair();
        self.push(transport);
        peer
    }

    /// Number of `connect` calls made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<MemoryTransport>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    async fn connect(&self, url: &str) -> Result<MemoryTransport> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.lock_pending()
            .pop_front()
            .ok_or_else(|| TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused (no queued memory transport)".to_string(),
            })
    }
}
