//! Status codes reported by the server in `bind` and `error` envelopes.

/// Numeric status code carried in an envelope's `message` field.
pub type StatusCode = u32;

pub const SUCCESS: StatusCode = 200;
pub const PEER_DISCONNECTED: StatusCode = 209;
pub const INVALID_PAIRING_ID: StatusCode = 210;
pub const BINDING_NOT_DELIVERED: StatusCode = 211;
pub const ALREADY_BOUND: StatusCode = 400;
pub const TARGET_NOT_FOUND: StatusCode = 401;
pub const NOT_BOUND: StatusCode = 402;
pub const INVALID_JSON: StatusCode = 403;
pub const RECIPIENT_OFFLINE: StatusCode = 404;
pub const MESSAGE_TOO_LONG: StatusCode = 405;
pub const SERVER_ERROR: StatusCode = 500;

/// Fallback for a non-numeric `bind` rejection payload.
pub const UNPARSED_BIND_FAILURE: StatusCode = 0;

/// Every documented code, in ascending order.
pub const KNOWN_CODES: [StatusCode; 11] = [
    SUCCESS,
    PEER_DISCONNECTED,
    INVALID_PAIRING_ID,
    BINDING_NOT_DELIVERED,
    ALREADY_BOUND,
    TARGET_NOT_FOUND,
    NOT_BOUND,
    INVALID_JSON,
    RECIPIENT_OFFLINE,
    MESSAGE_TOO_LONG,
    SERVER_ERROR,
];

/// Human-readable description of a status code.
pub fn describe(code: StatusCode) -> &'static str {
    match code {
        SUCCESS => "success",
        PEER_DISCONNECTED => "peer disconnected",
        INVALID_PAIRING_ID => "no valid client id in QR code / pairing token",
        BINDING_NOT_DELIVERED => {
            "connected, but the server has not yet delivered the peer id for binding"
        }
        ALREADY_BOUND => "this id is already bound by another client",
        TARGET_NOT_FOUND => "target client to bind does not exist",
        NOT_BOUND => "sender and receiver are not in a bound relationship",
        INVALID_JSON => "payload is not a valid JSON object",
        RECIPIENT_OFFLINE => "recipient not found (offline)",
        MESSAGE_TOO_LONG => "message exceeds the maximum length of 1950",
        SERVER_ERROR => "server internal error",
        _ => "unknown error",
    }
}

/// Stand-in for a decimal payload too large to represent; describes as unknown.
pub const OUT_OF_RANGE: StatusCode = StatusCode::MAX;

/// Parse a status code from a payload, using `fallback` when the payload is
/// not a plain decimal number. Numbers that overflow map to [`OUT_OF_RANGE`].
pub fn parse_code(payload: &str, fallback: StatusCode) -> StatusCode {
    if payload.is_empty() || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return fallback;
    }
    payload.parse().unwrap_or(OUT_OF_RANGE)
}
