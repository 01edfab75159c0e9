//! Decode error types.

use thiserror::Error;

/// Result type for envelope and payload decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors that can occur while unwrapping a device envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input did not contain a `header.payload` segment.
    #[error("malformed envelope: no payload segment found")]
    MalformedEnvelope,

    /// The payload segment was not valid base64.
    #[error("invalid base64 payload: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The decoded payload did not match the expected JSON structure.
    #[error("payload schema mismatch: {0}")]
    Schema(#[from] serde_json::Error),

    /// A field inside the decoded payload had an unusable value.
    #[error("invalid value for `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

impl DecodeError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
        }
    }

    /// Returns a short stable name for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope => "malformed_envelope",
            Self::Encoding(_) => "encoding_error",
            Self::Schema(_) | Self::InvalidField { .. } => "schema_error",
        }
    }
}
