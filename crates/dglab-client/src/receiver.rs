use std::sync::Arc;

use dglab_codec::decode_envelope;
use dglab_transport::MessageTransport;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::Session;

/// Read inbound messages until the transport closes, the session loses its
/// connection flag, or `shutdown` fires.
///
/// A transport that ends (cleanly or with an error) stops the loop and moves
/// the state to `Disconnected` without touching the connection flag; sends
/// observe the loss on their own. `ended` is cancelled however the loop
/// exits. Undecodable messages are logged and skipped.
pub async fn run_receiver<T: MessageTransport>(
    session: Arc<Session<T>>,
    transport: Arc<T>,
    shutdown: CancellationToken,
    ended: CancellationToken,
) {
    let _ended = ended.drop_guard();

    while session.is_connected() {
        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("receiver shutting down");
                return;
            }
            received = transport.recv() => received,
        };

        let text = match received {
            Ok(Some(text)) => text,
            Ok(None) => {
                info!("connection closed by server");
                lost(&session, &shutdown);
                break;
            }
            Err(err) => {
                warn!(%err, "receive failed");
                lost(&session, &shutdown);
                break;
            }
        };

        let envelope = match decode_envelope(&text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "discarding undecodable message");
                continue;
            }
        };

        if let Err(err) = session.handle_envelope(&envelope) {
            warn!(%err, msg_type = %envelope.msg_type, "envelope rejected");
        }
    }
    debug!("receiver stopped");
}

fn lost<T: MessageTransport>(session: &Session<T>, shutdown: &CancellationToken) {
    // close() already moved the state on.
    if !shutdown.is_cancelled() {
        session.transport_lost();
    }
}
