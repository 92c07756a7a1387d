//! Command payloads carried in the `message` field of `msg` envelopes.
//!
//! | Command  | Payload                                  |
//! |----------|------------------------------------------|
//! | strength | `strength-{channel}+{mode}+{value}`      |
//! | pulse    | `pulse-{A\|B}:["0A0A0A0A",...]`          |
//! | clear    | `clear-{channel}`                        |
//!
//! Builders validate every argument first; nothing is produced for an
//! out-of-range argument.

use std::fmt;
use std::str::FromStr;

use crate::error::{CodecError, Result};

/// Highest strength value a channel accepts.
pub const MAX_STRENGTH: u16 = 200;
/// Maximum number of waveform frames in one pulse payload.
pub const MAX_PULSE_FRAMES: usize = 100;
/// Length of one waveform frame in hexadecimal characters.
pub const PULSE_FRAME_HEX_LEN: usize = 8;

/// How a strength value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthMode {
    Decrease = 0,
    Increase = 1,
    Set = 2,
}

impl TryFrom<u8> for StrengthMode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Decrease),
            1 => Ok(Self::Increase),
            2 => Ok(Self::Set),
            other => Err(CodecError::invalid(
                "mode",
                format!("{other} (expected 0, 1 or 2)"),
            )),
        }
    }
}

/// Waveform output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseChannel {
    A,
    B,
}

impl PulseChannel {
    pub fn as_char(self) -> char {
        match self {
            PulseChannel::A => 'A',
            PulseChannel::B => 'B',
        }
    }
}

impl fmt::Display for PulseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<char> for PulseChannel {
    type Error = CodecError;

    fn try_from(value: char) -> Result<Self> {
        match value {
            'A' => Ok(Self::A),
            'B' => Ok(Self::B),
            other => Err(CodecError::invalid(
                "pulse channel",
                format!("{other:?} (expected 'A' or 'B')"),
            )),
        }
    }
}

impl FromStr for PulseChannel {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::try_from(c),
            _ => Err(CodecError::invalid(
                "pulse channel",
                format!("{s:?} (expected 'A' or 'B')"),
            )),
        }
    }
}

/// Build `strength-{channel}+{mode}+{value}`.
///
/// `channel` is 1 (A) or 2 (B); `mode` is 0 (decrease), 1 (increase) or
/// 2 (set); `value` is within `0..=200`.
pub fn strength_payload(channel: u8, mode: u8, value: u16) -> Result<String> {
    validate_numeric_channel(channel)?;
    let mode = StrengthMode::try_from(mode)?;
    if value > MAX_STRENGTH {
        return Err(CodecError::invalid(
            "strength",
            format!("{value} (max {MAX_STRENGTH})"),
        ));
    }
    Ok(format!("strength-{channel}+{}+{value}", mode as u8))
}

/// Build `pulse-{channel}:{json array}`.
///
/// At most [`MAX_PULSE_FRAMES`] frames, each exactly
/// [`PULSE_FRAME_HEX_LEN`] hexadecimal characters. Order is preserved.
pub fn pulse_payload<S: AsRef<str>>(channel: PulseChannel, frames: &[S]) -> Result<String> {
    if frames.len() > MAX_PULSE_FRAMES {
        return Err(CodecError::invalid(
            "pulses",
            format!("{} frames (max {MAX_PULSE_FRAMES})", frames.len()),
        ));
    }

    let mut list = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        let frame = frame.as_ref();
        if frame.len() != PULSE_FRAME_HEX_LEN || !frame.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CodecError::invalid(
                "pulses",
                format!(
                    "frame {index} {frame:?} is not {PULSE_FRAME_HEX_LEN} hexadecimal characters"
                ),
            ));
        }
        list.push(frame);
    }

    Ok(format!("pulse-{channel}:{}", serde_json::to_string(&list)?))
}

/// Build `clear-{channel}` for channel 1 (A) or 2 (B).
pub fn clear_payload(channel: u8) -> Result<String> {
    validate_numeric_channel(channel)?;
    Ok(format!("clear-{channel}"))
}

fn validate_numeric_channel(channel: u8) -> Result<()> {
    match channel {
        1 | 2 => Ok(()),
        other => Err(CodecError::invalid(
            "channel",
            format!("{other} (expected 1 or 2)"),
        )),
    }
}
