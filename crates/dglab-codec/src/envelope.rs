use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// `message` of the server's identity assignment (`bind` envelope).
pub const IDENTITY_ASSIGNMENT: &str = "targetId";
/// `message` of an outbound bind request.
pub const BIND_REQUEST: &str = "DGLAB";
/// `message` of a heartbeat and of a successful bind confirmation.
pub const HEARTBEAT_OK: &str = "200";

/// Envelope type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Identity assignment, bind request, bind confirmation or bind failure.
    Bind,
    /// Controller liveness signal.
    Heartbeat,
    /// Command or status payload exchanged with the device.
    Msg,
    /// Server-reported error code.
    Error,
    /// Disconnect instruction from the remote side.
    Break,
    /// Any type this client does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Bind => "bind",
            MessageType::Heartbeat => "heartbeat",
            MessageType::Msg => "msg",
            MessageType::Error => "error",
            MessageType::Break => "break",
            MessageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four-field protocol message unit.
///
/// Inbound envelopes frequently omit fields (`{"type":"break"}`) or send
/// `null`; both decode to an empty string so every envelope carries all four
/// fields once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub msg_type: MessageType,
    #[serde(rename = "clientId", default, deserialize_with = "null_as_empty")]
    pub client_id: String,
    #[serde(rename = "targetId", default, deserialize_with = "null_as_empty")]
    pub target_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(
        msg_type: MessageType,
        client_id: impl Into<String>,
        target_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            msg_type,
            client_id: client_id.into(),
            target_id: target_id.into(),
            message: message.into(),
        }
    }

    /// Create a heartbeat. `target_id` is empty while unbound.
    pub fn heartbeat(client_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::new(MessageType::Heartbeat, client_id, target_id, HEARTBEAT_OK)
    }

    /// Create a bind request for `target_id`.
    pub fn bind_request(client_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::new(MessageType::Bind, client_id, target_id, BIND_REQUEST)
    }

    /// Create a `msg` envelope carrying a command payload.
    pub fn command(
        client_id: impl Into<String>,
        target_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self::new(MessageType::Msg, client_id, target_id, payload)
    }

    /// Whether this is the server's identity assignment.
    pub fn is_identity_assignment(&self) -> bool {
        self.msg_type == MessageType::Bind && self.message == IDENTITY_ASSIGNMENT
    }

    /// Whether this is a successful bind confirmation.
    pub fn is_bind_confirmation(&self) -> bool {
        self.msg_type == MessageType::Bind && self.message == HEARTBEAT_OK
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
