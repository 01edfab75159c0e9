//! Error types for device transport and protocol adapters.

use biolink_core::DecodeError;
use thiserror::Error;

/// A specialized Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// An error that occurred while talking to a device service.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A device envelope or payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Nothing answered on the port.
    #[error("no device service on port {port}: {message}")]
    ProbeUnavailable { port: u16, message: String },

    /// The call exceeded its deadline.
    #[error("timeout during {operation}")]
    Timeout { operation: String },

    /// No adapter is registered for the negotiated spec version.
    #[error("unsupported spec version: {0}")]
    UnsupportedSpecVersion(String),

    /// The adapter exists but does not implement the operation.
    #[error("{operation} is not implemented for spec version {spec_version}")]
    NotImplemented {
        spec_version: String,
        operation: &'static str,
    },

    /// The device service answered with a non-success HTTP status.
    #[error("device service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport-level failure other than timeout or refused connection.
    #[error("network error: {0}")]
    Network(String),

    /// A request body could not be serialized, or a response body was not
    /// the expected JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeviceError {
    /// Creates a probe-unavailable error.
    pub fn unavailable(port: u16, message: impl Into<String>) -> Self {
        Self::ProbeUnavailable {
            port,
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a not-implemented error.
    pub fn not_implemented(spec_version: impl Into<String>, operation: &'static str) -> Self {
        Self::NotImplemented {
            spec_version: spec_version.into(),
            operation,
        }
    }

    /// Returns true if the call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if nothing was listening on the port.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ProbeUnavailable { .. })
    }
}
