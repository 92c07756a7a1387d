//! Shared connection record.
//!
//! A [`Session`] is shared between the public [`Client`](crate::Client), the
//! receive loop and the heartbeat driver. The connection flag is the only
//! state both background tasks mutate-observe; it is an atomic so a flip is
//! seen by the other task no later than its next loop check. Identifiers are
//! written on the handshake and bind-confirmation paths and read everywhere
//! else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use dglab_codec::status::{self, StatusCode};
use dglab_codec::{encode_envelope, CodecError, Envelope, MessageType};
use dglab_transport::MessageTransport;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ClientError, Result};
use crate::state::{ConnectionState, StateEvent};

/// An established transport plus the token that stops its background tasks.
///
/// `ended` is cancelled once the receive loop for this transport has stopped.
pub(crate) struct Connection<T> {
    pub(crate) transport: Arc<T>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) ended: CancellationToken,
}

impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            shutdown: self.shutdown.clone(),
            ended: self.ended.clone(),
        }
    }
}

/// Connection state shared by the client and its background tasks.
pub struct Session<T> {
    config: RwLock<ClientConfig>,
    connection: Mutex<Option<Connection<T>>>,
    connected: AtomicBool,
    state: Mutex<ConnectionState>,
    client_id: Mutex<Option<String>>,
    target_id: Mutex<Option<String>>,
    dispatcher: Dispatcher,
}

impl<T: MessageTransport> Session<T> {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: RwLock::new(config),
            connection: Mutex::new(None),
            connected: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::Disconnected),
            client_id: Mutex::new(None),
            target_id: Mutex::new(None),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update_config(&self, update: impl FnOnce(&mut ClientConfig)) {
        update(
            &mut self
                .config
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The connection flag: true from identity assignment until `break`,
    /// `close()` or a failed reconnect.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub fn client_id(&self) -> Option<String> {
        lock(&self.client_id).clone()
    }

    pub fn target_id(&self) -> Option<String> {
        lock(&self.target_id).clone()
    }

    pub(crate) fn set_target_id(&self, target_id: &str) {
        *lock(&self.target_id) = Some(target_id.to_string());
    }

    /// Apply a state transition, leaving the state untouched when it is
    /// illegal.
    pub(crate) fn apply(&self, event: StateEvent) -> Result<ConnectionState> {
        let mut state = lock(&self.state);
        let next = state.transition(event)?;
        debug!(from = ?*state, to = ?next, ?event, "state transition");
        *state = next;
        Ok(next)
    }

    pub(crate) fn connection(&self) -> Option<Connection<T>> {
        lock(&self.connection).clone()
    }

    /// Detach the current connection, stopping its tasks.
    pub(crate) fn take_connection(&self) -> Option<Connection<T>> {
        let connection = lock(&self.connection).take();
        if let Some(connection) = &connection {
            connection.shutdown.cancel();
            connection.ended.cancel();
        }
        connection
    }

    /// Forget identifiers from a previous connection lifetime.
    pub(crate) fn reset_identity(&self) {
        *lock(&self.client_id) = None;
        *lock(&self.target_id) = None;
    }

    /// Install a freshly handshaken connection and raise the connection flag.
    pub(crate) fn install(&self, connection: Connection<T>, client_id: String) -> Result<()> {
        self.apply(StateEvent::IdentityAssigned)?;
        *lock(&self.client_id) = Some(client_id);
        *lock(&self.connection) = Some(connection);
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    /// Record a failed connection attempt.
    pub(crate) fn fail(&self) {
        self.connected.store(false, Ordering::Release);
        let _ = self.apply(StateEvent::Fail);
    }

    /// The transport ended under the receive loop. Leaves the flag for the
    /// next send to observe; only the state moves to `Disconnected`.
    pub(crate) fn transport_lost(&self) {
        if let Err(err) = self.apply(StateEvent::Fail) {
            debug!(%err, "transport loss after state change");
        }
    }

    /// Lower the connection flag and enter `Closed`.
    pub(crate) fn mark_closed(&self) {
        self.connected.store(false, Ordering::Release);
        let _ = self.apply(StateEvent::Close);
    }

    /// Encode and send one envelope on the current connection.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        let connection = self
            .connection()
            .filter(|_| self.is_connected())
            .ok_or(ClientError::NotConnected)?;

        let max = self.config().max_message_length;
        let text = encode_envelope(envelope, max)?;
        connection.transport.send(text).await?;
        debug!(msg_type = %envelope.msg_type, message = %envelope.message, "sent envelope");
        Ok(())
    }

    /// Send an envelope, logging instead of returning any failure.
    ///
    /// Returns whether the envelope was handed to the transport.
    pub(crate) async fn send_logged(&self, envelope: &Envelope) -> bool {
        match self.send_envelope(envelope).await {
            Ok(()) => true,
            Err(ClientError::NotConnected) => {
                warn!(msg_type = %envelope.msg_type, "not connected; message not sent");
                false
            }
            Err(ClientError::Codec(err @ CodecError::MessageTooLong { .. })) => {
                error!(%err, msg_type = %envelope.msg_type, "message too long; not sent");
                false
            }
            Err(err) => {
                error!(%err, msg_type = %envelope.msg_type, "send failed");
                false
            }
        }
    }

    /// Send one heartbeat. Skipped until a client id is assigned.
    pub async fn send_heartbeat(&self) -> bool {
        let Some(client_id) = self.client_id() else {
            debug!("no client id; heartbeat skipped");
            return false;
        };
        let target_id = self.target_id().unwrap_or_default();
        self.send_logged(&Envelope::heartbeat(client_id, target_id))
            .await
    }

    /// Interpret one decoded inbound envelope.
    ///
    /// Type-specific handling runs first; the envelope is then forwarded to
    /// the generic message handler regardless of its type or of the outcome.
    /// Returns an error only for an envelope the current state cannot accept
    /// (a bind confirmation outside `Ready`).
    pub fn handle_envelope(&self, envelope: &Envelope) -> Result<()> {
        let outcome = match envelope.msg_type {
            MessageType::Bind if envelope.is_bind_confirmation() => self.confirm_bind(envelope),
            MessageType::Bind if envelope.is_identity_assignment() => {
                debug!(
                    client_id = %envelope.client_id,
                    "ignoring repeated client id assignment"
                );
                Ok(())
            }
            MessageType::Bind => {
                let code = status::parse_code(&envelope.message, status::UNPARSED_BIND_FAILURE);
                self.report_error("bind rejected", code);
                Ok(())
            }
            MessageType::Error => {
                let code = status::parse_code(&envelope.message, status::SERVER_ERROR);
                self.report_error("server error", code);
                Ok(())
            }
            MessageType::Msg => {
                if envelope.message.starts_with("strength-") {
                    info!(payload = %envelope.message, "strength sync");
                } else if envelope.message.starts_with("feedback-") {
                    info!(payload = %envelope.message, "device feedback");
                } else {
                    debug!(payload = %envelope.message, "message");
                }
                Ok(())
            }
            MessageType::Break => {
                info!("received disconnect instruction");
                self.connected.store(false, Ordering::Release);
                self.apply(StateEvent::Break).map(|_| ())
            }
            MessageType::Heartbeat | MessageType::Unknown => {
                debug!(msg_type = %envelope.msg_type, "unhandled envelope type");
                Ok(())
            }
        };

        self.dispatcher.message(envelope);
        outcome
    }

    fn confirm_bind(&self, envelope: &Envelope) -> Result<()> {
        self.apply(StateEvent::BindConfirmed)?;
        // The server-confirmed id replaces whatever bind_target stored.
        self.set_target_id(&envelope.target_id);
        let client_id = self.client_id().unwrap_or_default();
        info!(%client_id, target_id = %envelope.target_id, "bind confirmed");
        self.dispatcher.bind(&client_id, &envelope.target_id);
        Ok(())
    }

    fn report_error(&self, context: &str, code: StatusCode) {
        let message = status::describe(code);
        error!(code, %message, "{context}");
        self.dispatcher.error(code, message);
    }
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.connected.load(Ordering::Acquire))
            .field("state", &*lock(&self.state))
            .field("client_id", &*lock(&self.client_id))
            .field("target_id", &*lock(&self.target_id))
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
