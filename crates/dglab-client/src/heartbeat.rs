use std::sync::Arc;

use dglab_transport::MessageTransport;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::Session;

/// Send a heartbeat, then wait one interval, while the session stays
/// connected.
///
/// The interval is re-read from the session configuration every tick.
/// Send failures are logged by the session and do not stop the driver.
pub async fn run_heartbeat<T: MessageTransport>(
    session: Arc<Session<T>>,
    shutdown: CancellationToken,
) {
    while session.is_connected() {
        session.send_heartbeat().await;

        let interval = session.config().heartbeat_interval;
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("heartbeat stopped");
}
