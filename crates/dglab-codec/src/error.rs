/// Errors that can occur during envelope encoding/decoding and command
/// payload construction.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not a valid envelope object.
    #[error("invalid envelope json: {0}")]
    Json(#[from] serde_json::Error),

    /// The encoded envelope exceeds the configured maximum length.
    #[error("message too long ({size} bytes, max {max})")]
    MessageTooLong { size: usize, max: usize },

    /// A command argument is outside its allowed range.
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

impl CodecError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
