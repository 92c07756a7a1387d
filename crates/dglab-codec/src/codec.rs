use tracing::trace;

use crate::envelope::Envelope;
use crate::error::{CodecError, Result};

/// Default maximum encoded message length in bytes.
///
/// Mirrors the server-side limit; the server answers oversized messages with
/// status 405.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 1950;

/// Encode an envelope into its wire form.
///
/// Wire format (compact JSON, field order fixed):
/// ```text
/// {"type":"msg","clientId":"...","targetId":"...","message":"..."}
/// ```
///
/// Fails with [`CodecError::MessageTooLong`] when the encoded text exceeds
/// `max_message_length` bytes; nothing is produced in that case.
pub fn encode_envelope(envelope: &Envelope, max_message_length: usize) -> Result<String> {
    let text = serde_json::to_string(envelope)?;
    if text.len() > max_message_length {
        return Err(CodecError::MessageTooLong {
            size: text.len(),
            max: max_message_length,
        });
    }
    trace!(len = text.len(), "encoded envelope");
    Ok(text)
}

/// Decode an envelope from wire text.
pub fn decode_envelope(text: &str) -> Result<Envelope> {
    Ok(serde_json::from_str(text)?)
}
