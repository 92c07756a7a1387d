//! Envelope codec for the DG-LAB socket protocol.
//!
//! Every wire message is a compact JSON object with exactly four string
//! fields:
//! - `type`: one of `bind`, `heartbeat`, `msg`, `error`, `break`
//! - `clientId`: the controller identifier assigned by the server
//! - `targetId`: the bound device identifier
//! - `message`: the payload (status code, command string, ...)
//!
//! Framing is the transport's job; this crate only turns envelopes into text
//! and back, enforces the message length limit, and builds the command
//! payloads carried inside `msg` envelopes.

pub mod codec;
pub mod command;
pub mod envelope;
pub mod error;
pub mod status;

pub use codec::{decode_envelope, encode_envelope, DEFAULT_MAX_MESSAGE_LENGTH};
pub use command::{
    clear_payload, pulse_payload, strength_payload, PulseChannel, StrengthMode, MAX_PULSE_FRAMES,
    MAX_STRENGTH, PULSE_FRAME_HEX_LEN,
};
pub use envelope::{Envelope, MessageType, BIND_REQUEST, HEARTBEAT_OK, IDENTITY_ASSIGNMENT};
pub use error::{CodecError, Result};
pub use status::{describe, parse_code, StatusCode};
