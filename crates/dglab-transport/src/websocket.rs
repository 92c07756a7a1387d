use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Connector, MessageTransport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket text-message transport.
///
/// The stream is split into independently locked halves so a task blocked in
/// [`MessageTransport::recv`] never delays a concurrent `send`. Writers are
/// serialized by the sink lock.
pub struct WebSocketTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether [`MessageTransport::close`] has been called or the remote side
    /// closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl MessageTransport for WebSocketTransport {
    async fn send(&self, text: String) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut sink = self.sink.lock().await;
        match sink.send(Message::Text(text)).await {
            Ok(()) => Ok(()),
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                self.closed.store(true, Ordering::Release);
                Err(TransportError::Closed)
            }
            Err(WsError::Io(err)) => Err(TransportError::Io(err)),
            Err(err) => Err(TransportError::Send(err.to_string())),
        }
    }

    async fn recv(&self) -> Result<Option<String>> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    warn!(len = data.len(), "ignoring binary websocket message");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "websocket closed by peer");
                    self.closed.store(true, Ordering::Release);
                    return Ok(None);
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    self.closed.store(true, Ordering::Release);
                    return Ok(None);
                }
                Some(Err(WsError::Io(err))) => return Err(TransportError::Io(err)),
                Some(Err(err)) => return Err(TransportError::Receive(err.to_string())),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(WsError::Io(err)) => Err(TransportError::Io(err)),
            Err(err) => Err(TransportError::Send(err.to_string())),
        }
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Opens [`WebSocketTransport`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self, url: &str) -> Result<WebSocketTransport> {
        let url = normalize_url(url);
        let (ws, response) = connect_async(url.as_str())
            .await
            .map_err(|err| TransportError::Connect {
                url: url.clone(),
                reason: err.to_string(),
            })?;

        info!(%url, status = %response.status(), "websocket connected");
        Ok(WebSocketTransport::from_stream(ws))
    }
}

/// Prefix `ws://` when the address carries no scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else {
        format!("ws://{url}")
    }
}
