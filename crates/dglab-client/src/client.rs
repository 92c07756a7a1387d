use std::sync::{Arc, Mutex};
use std::time::Duration;

use dglab_codec::{
    clear_payload, pulse_payload, strength_payload, Envelope, PulseChannel, StatusCode,
};
use dglab_transport::{Connector, MessageTransport, WebSocketConnector};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::handshake::await_identity;
use crate::heartbeat::run_heartbeat;
use crate::receiver::run_receiver;
use crate::session::{Connection, Session};
use crate::state::{ConnectionState, StateEvent};

/// Prefix the DG-LAB app expects in front of a pairing token inside a QR code.
pub const QR_CONTENT_PREFIX: &str = "https://www.dungeon-lab.com/app-download.php#DGLAB-SOCKET#";

struct Tasks {
    heartbeat: JoinHandle<()>,
    receiver: JoinHandle<()>,
}

/// Controller-side client for a DG-LAB relay server.
///
/// One client drives one connection at a time. Commands never fail loudly:
/// they return whether the message was handed to the transport and log the
/// reason when it was not. Only [`connect`](Self::connect) reports errors.
///
/// Must be used from within a tokio runtime; see
/// [`BlockingClient`](crate::BlockingClient) for synchronous callers.
pub struct Client<C: Connector = WebSocketConnector> {
    connector: C,
    session: Arc<Session<C::Transport>>,
    tasks: Mutex<Option<Tasks>>,
}

impl Client<WebSocketConnector> {
    /// Create a client that connects over WebSocket.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(WebSocketConnector::new(), config)
    }
}

impl<C: Connector> Client<C> {
    pub fn with_connector(connector: C, config: ClientConfig) -> Self {
        Self {
            connector,
            session: Arc::new(Session::new(config)),
            tasks: Mutex::new(None),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect to the configured server and wait for the assigned client id.
    ///
    /// A no-op when already connected with a client id. Otherwise any previous
    /// connection is released first, so calling this again after a `break` or
    /// a dropped transport reconnects. On success the heartbeat driver and the
    /// receive loop are running.
    pub async fn connect(&self) -> Result<()> {
        if self.session.is_connected()
            && self.session.state().is_ready()
            && self.session.client_id().is_some()
        {
            debug!("already connected");
            return Ok(());
        }

        self.session.apply(StateEvent::Dial)?;
        self.release().await;
        self.session.reset_identity();

        let config = self.session.config();
        info!(url = %config.ws_url, "connecting");
        let transport = match self.connector.connect(&config.ws_url).await {
            Ok(transport) => Arc::new(transport),
            Err(err) => {
                self.session.fail();
                return Err(err.into());
            }
        };

        let shutdown = CancellationToken::new();
        let ended = CancellationToken::new();
        let established: Result<()> = async {
            self.session.apply(StateEvent::TransportUp)?;
            let client_id = await_identity(transport.as_ref(), config.handshake_timeout).await?;
            self.session.install(
                Connection {
                    transport: transport.clone(),
                    shutdown: shutdown.clone(),
                    ended: ended.clone(),
                },
                client_id,
            )
        }
        .await;

        if let Err(err) = established {
            warn!(%err, "connection handshake failed");
            if let Err(close_err) = transport.close().await {
                debug!(err = %close_err, "closing failed transport");
            }
            self.session.fail();
            return Err(err);
        }

        let tasks = Tasks {
            heartbeat: tokio::spawn(run_heartbeat(self.session.clone(), shutdown.clone())),
            receiver: tokio::spawn(run_receiver(
                self.session.clone(),
                transport,
                shutdown,
                ended,
            )),
        };
        if let Some(stale) = lock(&self.tasks).replace(tasks) {
            stale.heartbeat.abort();
            stale.receiver.abort();
        }
        Ok(())
    }

    /// Ask the server to bind this client to `target_id`.
    ///
    /// The target id is stored immediately; a later bind confirmation
    /// replaces it with the id the server reports.
    pub async fn bind_target(&self, target_id: &str) -> bool {
        let Some(client_id) = self.session.client_id() else {
            warn!("no client id yet; connect before binding");
            return false;
        };
        self.session.set_target_id(target_id);
        info!(%client_id, %target_id, "requesting bind");
        self.session
            .send_logged(&Envelope::bind_request(client_id, target_id))
            .await
    }

    /// Change channel strength. `channel` is 1 (A) or 2 (B); `mode` is 0
    /// (decrease), 1 (increase) or 2 (set); `value` is 0..=200.
    pub async fn send_strength(&self, channel: u8, mode: u8, value: u16) -> bool {
        match strength_payload(channel, mode, value) {
            Ok(payload) => self.send_command(payload).await,
            Err(err) => {
                warn!(%err, "strength command rejected");
                false
            }
        }
    }

    /// Queue waveform frames on channel `'A'` or `'B'`. At most 100 frames,
    /// each 8 hex characters.
    pub async fn send_pulse<S: AsRef<str>>(&self, channel: char, frames: &[S]) -> bool {
        let payload = PulseChannel::try_from(channel)
            .and_then(|channel| pulse_payload(channel, frames));
        match payload {
            Ok(payload) => self.send_command(payload).await,
            Err(err) => {
                warn!(%err, "pulse command rejected");
                false
            }
        }
    }

    /// Clear the queued waveform on channel 1 (A) or 2 (B).
    pub async fn send_clear_queue(&self, channel: u8) -> bool {
        match clear_payload(channel) {
            Ok(payload) => self.send_command(payload).await,
            Err(err) => {
                warn!(%err, "clear command rejected");
                false
            }
        }
    }

    /// Send a heartbeat outside the regular schedule.
    pub async fn send_heartbeat(&self) -> bool {
        self.session.send_heartbeat().await
    }

    /// Process one decoded inbound envelope as if it came from the server.
    pub fn handle_envelope(&self, envelope: &Envelope) -> Result<()> {
        self.session.handle_envelope(envelope)
    }

    /// Close the connection and stop background work. Idempotent.
    pub async fn close(&self) {
        self.session.mark_closed();

        if let Some(connection) = self.session.take_connection() {
            if let Err(err) = connection.transport.close().await {
                warn!(%err, "closing transport");
            }
            info!("connection closed");
        }

        let tasks = lock(&self.tasks).take();
        if let Some(tasks) = tasks {
            let _ = tasks.heartbeat.await;
            let _ = tasks.receiver.await;
        }
        self.session.reset_identity();
    }

    /// Resolves once the receive loop of the current connection has stopped:
    /// the server closed the socket, the transport failed, a `break` arrived
    /// or the client was closed. Resolves immediately when there is no
    /// connection.
    pub async fn disconnected(&self) {
        if let Some(connection) = self.session.connection() {
            connection.ended.cancelled().await;
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn client_id(&self) -> Option<String> {
        self.session.client_id()
    }

    pub fn target_id(&self) -> Option<String> {
        self.session.target_id()
    }

    /// `<host-path>/<client_id>`, or `None` before a client id is assigned.
    pub fn pairing_token(&self) -> Option<String> {
        let client_id = self.session.client_id()?;
        Some(format!("{}/{client_id}", self.session.config().host_path()))
    }

    /// Content for the QR code the app scans to bind.
    pub fn qr_content(&self) -> Option<String> {
        self.pairing_token()
            .map(|token| format!("{QR_CONTENT_PREFIX}{token}"))
    }

    pub fn config(&self) -> ClientConfig {
        self.session.config()
    }

    /// Takes effect on the next `connect()`.
    pub fn set_ws_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.session.update_config(|config| config.ws_url = url);
    }

    pub fn set_heartbeat_interval(&self, interval: Duration) {
        self.session
            .update_config(|config| config.heartbeat_interval = interval);
    }

    pub fn set_reconnect_delay(&self, delay: Duration) {
        self.session
            .update_config(|config| config.reconnect_delay = delay);
    }

    pub fn set_max_message_length(&self, max: usize) {
        self.session
            .update_config(|config| config.max_message_length = max);
    }

    pub fn set_handshake_timeout(&self, timeout: Duration) {
        self.session
            .update_config(|config| config.handshake_timeout = timeout);
    }

    pub fn set_on_message<F>(&self, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.session.dispatcher().set_on_message(handler);
    }

    pub fn set_on_bind<F>(&self, handler: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.session.dispatcher().set_on_bind(handler);
    }

    pub fn set_on_error<F>(&self, handler: F)
    where
        F: Fn(StatusCode, &str) + Send + Sync + 'static,
    {
        self.session.dispatcher().set_on_error(handler);
    }

    async fn send_command(&self, payload: String) -> bool {
        let Some(client_id) = self.session.client_id() else {
            warn!("no client id yet; command not sent");
            return false;
        };
        let target_id = self.session.target_id().unwrap_or_default();
        self.session
            .send_logged(&Envelope::command(client_id, target_id, payload))
            .await
    }

    // Detach the previous connection (if any) so a reconnect starts clean.
    async fn release(&self) {
        if let Some(connection) = self.session.take_connection() {
            if let Err(err) = connection.transport.close().await {
                debug!(%err, "closing previous transport");
            }
        }
        if let Some(stale) = lock(&self.tasks).take() {
            stale.heartbeat.abort();
            stale.receiver.abort();
        }
    }
}

impl<C: Connector> Drop for Client<C> {
    fn drop(&mut self) {
        if let Some(connection) = self.session.take_connection() {
            connection.shutdown.cancel();
        }
    }
}

impl<C: Connector> std::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use dglab_codec::{decode_envelope, MessageType};
    use dglab_transport::{MemoryConnector, MemoryPeer};

    use super::*;
    use crate::error::ClientError;

    fn assignment(client_id: &str) -> String {
        format!(r#"{{"type":"bind","clientId":"{client_id}","targetId":"","message":"targetId"}}"#)
    }

    fn memory_client() -> Client<MemoryConnector> {
        Client::with_connector(MemoryConnector::new(), ClientConfig::default())
    }

    async fn connected() -> (Client<MemoryConnector>, MemoryPeer) {
        connected_with(ClientConfig::default()).await
    }

    async fn connected_with(config: ClientConfig) -> (Client<MemoryConnector>, MemoryPeer) {
        let client = Client::with_connector(MemoryConnector::new(), config);
        let peer = client.connector().accept_next();
        peer.send(assignment("C1")).unwrap();
        client.connect().await.unwrap();
        (client, peer)
    }

    /// Next envelope from the client that is not a heartbeat.
    async fn next_command(peer: &mut MemoryPeer) -> Envelope {
        loop {
            let text = peer.recv().await.expect("client hung up");
            let envelope = decode_envelope(&text).unwrap();
            if envelope.msg_type != MessageType::Heartbeat {
                return envelope;
            }
        }
    }

    fn drain_commands(peer: &mut MemoryPeer) -> Vec<Envelope> {
        std::iter::from_fn(|| peer.try_recv())
            .map(|text| decode_envelope(&text).unwrap())
            .filter(|envelope| envelope.msg_type != MessageType::Heartbeat)
            .collect()
    }

    fn heartbeats(peer: &mut MemoryPeer) -> usize {
        std::iter::from_fn(|| peer.try_recv())
            .filter(|text| decode_envelope(text).unwrap().msg_type == MessageType::Heartbeat)
            .count()
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn connect_assigns_client_id() {
        let (client, _peer) = connected().await;
        assert!(client.is_connected());
        assert_eq!(client.client_id().as_deref(), Some("C1"));
        assert_eq!(client.state(), ConnectionState::Ready { bound: false });
    }

    #[tokio::test]
    async fn bind_flow_then_command_carries_target() {
        let (client, mut peer) = connected().await;
        let binds = Arc::new(StdMutex::new(Vec::new()));
        let log = binds.clone();
        client.set_on_bind(move |c, t| log.lock().unwrap().push((c.to_string(), t.to_string())));

        assert!(client.bind_target("T1").await);
        let request = next_command(&mut peer).await;
        assert_eq!(request.msg_type, MessageType::Bind);
        assert_eq!(request.client_id, "C1");
        assert_eq!(request.target_id, "T1");
        assert_eq!(request.message, "DGLAB");

        peer.send(r#"{"type":"bind","clientId":"C1","targetId":"T1","message":"200"}"#)
            .unwrap();
        while !client.state().is_bound() {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            *binds.lock().unwrap(),
            vec![("C1".to_string(), "T1".to_string())]
        );

        assert!(client.send_strength(1, 2, 50).await);
        let command = next_command(&mut peer).await;
        assert_eq!(command.msg_type, MessageType::Msg);
        assert_eq!(command.target_id, "T1");
        assert_eq!(command.message, "strength-1+2+50");
    }

    #[tokio::test]
    async fn server_error_keeps_connection() {
        let (client, peer) = connected().await;
        let errors = Arc::new(StdMutex::new(Vec::new()));
        let log = errors.clone();
        client.set_on_error(move |code, msg| log.lock().unwrap().push((code, msg.to_string())));

        peer.send(r#"{"type":"error","message":"404"}"#).unwrap();
        while errors.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            *errors.lock().unwrap(),
            vec![(404, "recipient not found (offline)".to_string())]
        );
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn break_stops_heartbeats() {
        let (client, mut peer) = connected().await;
        settle().await;

        peer.send(r#"{"type":"break","message":"209"}"#).unwrap();
        while client.is_connected() {
            tokio::task::yield_now().await;
        }
        assert_eq!(client.state(), ConnectionState::Disconnected);
        while peer.try_recv().is_some() {}

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(peer.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_follow_configured_interval() {
        let config = ClientConfig::default().with_heartbeat_interval(Duration::from_secs(5));
        let (client, mut peer) = connected_with(config).await;

        let first = decode_envelope(&peer.recv().await.unwrap()).unwrap();
        assert_eq!(first.msg_type, MessageType::Heartbeat);
        assert_eq!(first.client_id, "C1");
        assert_eq!(first.target_id, "");
        assert_eq!(first.message, "200");

        // Ticks at 5s and 10s.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(heartbeats(&mut peer), 2);

        // The driver is already waiting for 15s; the new interval applies after it.
        client.set_heartbeat_interval(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(heartbeats(&mut peer), 1);
    }

    #[tokio::test]
    async fn second_connect_is_a_noop() {
        let (client, _peer) = connected().await;
        client.connect().await.unwrap();
        assert_eq!(client.connector().attempts(), 1);
        assert_eq!(client.client_id().as_deref(), Some("C1"));
    }

    #[tokio::test]
    async fn reconnect_after_break_gets_new_identity() {
        let (client, peer) = connected().await;
        peer.send(r#"{"type":"break"}"#).unwrap();
        while client.is_connected() {
            tokio::task::yield_now().await;
        }

        let second = client.connector().accept_next();
        second.send(assignment("C2")).unwrap();
        client.connect().await.unwrap();

        assert_eq!(client.connector().attempts(), 2);
        assert_eq!(client.client_id().as_deref(), Some("C2"));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn server_hangup_is_observable_and_redials() {
        let (client, peer) = connected().await;
        drop(peer);

        tokio::time::timeout(Duration::from_secs(5), client.disconnected())
            .await
            .expect("receive loop should stop when the server hangs up");
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.is_connected());

        let second = client.connector().accept_next();
        second.send(assignment("C2")).unwrap();
        client.connect().await.unwrap();

        assert_eq!(client.connector().attempts(), 2);
        assert_eq!(client.client_id().as_deref(), Some("C2"));
        assert_eq!(client.state(), ConnectionState::Ready { bound: false });
    }

    #[tokio::test]
    async fn disconnected_resolves_without_connection() {
        let client = memory_client();
        client.disconnected().await;

        let (client, _peer) = connected().await;
        client.close().await;
        client.disconnected().await;
    }

    #[tokio::test]
    async fn disconnected_waits_while_connection_is_live() {
        let (client, _peer) = connected().await;
        let pending = tokio::time::timeout(Duration::from_millis(50), client.disconnected()).await;
        assert!(pending.is_err());
        assert_eq!(client.state(), ConnectionState::Ready { bound: false });
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_timeout_releases_transport() {
        let client = memory_client();
        let mut peer = client.connector().accept_next();

        let result = client.connect().await;

        assert!(matches!(result, Err(ClientError::HandshakeTimeout(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert_eq!(client.client_id(), None);
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn refused_connection_reports_error() {
        let client = memory_client();
        let result = client.connect().await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn invalid_arguments_send_nothing() {
        let (client, mut peer) = connected().await;

        assert!(!client.send_strength(1, 2, 201).await);
        assert!(!client.send_strength(3, 2, 10).await);
        assert!(!client.send_strength(1, 3, 10).await);
        assert!(!client.send_clear_queue(0).await);
        assert!(!client.send_pulse('C', &["0A0A0A0A"]).await);
        assert!(!client.send_pulse('A', &["xyz"]).await);

        settle().await;
        assert!(drain_commands(&mut peer).is_empty());
    }

    #[tokio::test]
    async fn pulse_frame_limit() {
        let (client, mut peer) = connected().await;

        let too_many = vec!["0A0A0A0A"; 101];
        assert!(!client.send_pulse('A', &too_many).await);

        let frames: Vec<String> = (0..100).map(|i| format!("{i:08X}")).collect();
        assert!(client.send_pulse('A', &frames).await);

        let command = next_command(&mut peer).await;
        let payload = command.message.strip_prefix("pulse-A:").unwrap();
        let decoded: Vec<String> = serde_json::from_str(payload).unwrap();
        assert_eq!(decoded, frames);
        assert!(!payload.contains(' '));
    }

    #[tokio::test]
    async fn commands_before_connect_are_refused() {
        let client = memory_client();
        assert!(!client.bind_target("T1").await);
        assert!(!client.send_strength(1, 2, 10).await);
        assert!(!client.send_clear_queue(1).await);
        assert!(!client.send_heartbeat().await);
        assert_eq!(client.target_id(), None);
    }

    #[tokio::test]
    async fn commands_use_empty_target_until_bound() {
        let (client, mut peer) = connected().await;
        assert!(client.send_clear_queue(2).await);
        let command = next_command(&mut peer).await;
        assert_eq!(command.target_id, "");
        assert_eq!(command.message, "clear-2");
    }

    #[tokio::test]
    async fn oversized_command_is_dropped() {
        let (client, mut peer) = connected().await;
        client.set_max_message_length(64);

        let frames = vec!["0A0A0A0A"; 20];
        assert!(!client.send_pulse('B', &frames).await);
        settle().await;
        assert!(drain_commands(&mut peer).is_empty());
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (client, mut peer) = connected().await;

        client.close().await;
        client.close().await;

        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(!client.is_connected());
        assert_eq!(client.client_id(), None);
        while peer.try_recv().is_some() {}
        assert!(peer.recv().await.is_none());
        assert!(!client.send_heartbeat().await);
    }

    #[tokio::test]
    async fn pairing_token_needs_client_id() {
        let client = memory_client();
        assert_eq!(client.pairing_token(), None);
        assert_eq!(client.qr_content(), None);

        let (client, _peer) = connected().await;
        assert_eq!(client.pairing_token().as_deref(), Some("localhost:9999/C1"));
        assert_eq!(
            client.qr_content().as_deref(),
            Some("https://www.dungeon-lab.com/app-download.php#DGLAB-SOCKET#localhost:9999/C1")
        );
    }

    #[tokio::test]
    async fn message_handler_sees_every_inbound_envelope() {
        let (client, peer) = connected().await;
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let log = seen.clone();
        client.set_on_message(move |env| log.lock().unwrap().push(env.message.clone()));

        peer.send(r#"{"type":"msg","message":"strength-0+0+200+200"}"#)
            .unwrap();
        peer.send("not json").unwrap();
        peer.send(r#"{"type":"msg","message":"feedback-1"}"#).unwrap();
        while seen.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["strength-0+0+200+200".to_string(), "feedback-1".to_string()]
        );
        assert!(client.is_connected());
    }
}
