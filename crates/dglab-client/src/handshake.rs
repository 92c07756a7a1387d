use std::time::Duration;

use dglab_codec::decode_envelope;
use dglab_transport::MessageTransport;
use tracing::{debug, info};

use crate::error::{ClientError, Result};

/// Wait for the server's identity assignment and return the client id.
///
/// The server greets every new connection with
/// `{"type":"bind","clientId":"<id>","message":"targetId"}`. Other well-formed
/// envelopes received first are skipped. The whole wait is bounded by
/// `timeout`; a closed transport, a transport error or an undecodable message
/// ends it early.
pub async fn await_identity<T: MessageTransport>(transport: &T, timeout: Duration) -> Result<String> {
    let wait = async {
        loop {
            let text = transport
                .recv()
                .await?
                .ok_or(ClientError::HandshakeClosed)?;
            let envelope = decode_envelope(&text)?;

            if envelope.is_identity_assignment() {
                if envelope.client_id.is_empty() {
                    return Err(ClientError::HandshakeFailed("empty clientId".to_string()));
                }
                info!(client_id = %envelope.client_id, "received client id");
                return Ok(envelope.client_id);
            }

            debug!(
                msg_type = %envelope.msg_type,
                "skipping envelope while awaiting client id"
            );
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| ClientError::HandshakeTimeout(timeout))?
}

#[cfg(test)]
mod tests {
    use dglab_transport::MemoryTransport;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn returns_assigned_client_id() {
        let (transport, peer) = MemoryTransport::pair();
        peer.send(r#"{"type":"bind","clientId":"C1","targetId":"","message":"targetId"}"#)
            .unwrap();

        let id = await_identity(&transport, TIMEOUT).await.unwrap();
        assert_eq!(id, "C1");
    }

    #[tokio::test]
    async fn skips_unrelated_envelopes() {
        let (transport, peer) = MemoryTransport::pair();
        peer.send(r#"{"type":"heartbeat","message":"200"}"#).unwrap();
        peer.send(r#"{"type":"bind","clientId":"C2","message":"targetId"}"#)
            .unwrap();

        assert_eq!(await_identity(&transport, TIMEOUT).await.unwrap(), "C2");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_assignment() {
        let (transport, _peer) = MemoryTransport::pair();
        let result = await_identity(&transport, TIMEOUT).await;
        assert!(matches!(result, Err(ClientError::HandshakeTimeout(t)) if t == TIMEOUT));
    }

    #[tokio::test]
    async fn closed_transport_fails() {
        let (transport, mut peer) = MemoryTransport::pair();
        peer.close();
        assert!(matches!(
            await_identity(&transport, TIMEOUT).await,
            Err(ClientError::HandshakeClosed)
        ));
    }

    #[tokio::test]
    async fn malformed_message_fails() {
        let (transport, peer) = MemoryTransport::pair();
        peer.send("{not-json").unwrap();
        assert!(matches!(
            await_identity(&transport, TIMEOUT).await,
            Err(ClientError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn empty_client_id_rejected() {
        let (transport, peer) = MemoryTransport::pair();
        peer.send(r#"{"type":"bind","clientId":null,"message":"targetId"}"#)
            .unwrap();
        assert!(matches!(
            await_identity(&transport, TIMEOUT).await,
            Err(ClientError::HandshakeFailed(_))
        ));
    }

    #[tokio::test]
    async fn long_client_id_accepted() {
        let (transport, peer) = MemoryTransport::pair();
        let long_id = "a".repeat(512);
        peer.send(format!(
            r#"{{"type":"bind","clientId":"{long_id}","message":"targetId"}}"#
        ))
        .unwrap();
        assert_eq!(await_identity(&transport, TIMEOUT).await.unwrap(), long_id);
    }
}
