//! Manager error types.

use std::io;

use biolink_adapters::DeviceError;
use thiserror::Error;

/// Result type for manager setup operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Result type for capture-path operations.
pub type ScanResult<T> = Result<T, CaptureError>;

/// Errors that can occur while setting up the manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// IO error (reading a config file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Config file is not valid TOML or has the wrong shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Device transport could not be created.
    #[error("Transport error: {0}")]
    Transport(#[from] DeviceError),
}

impl ManagerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Failures surfaced to callers of the capture operations.
///
/// A missing device is not an error; those operations return `None`.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device advertises no spec version this client supports.
    #[error("device {device_type} reports no supported spec version")]
    InvalidSpecVersion { device_type: String },

    /// The device is not registered for use at this workstation.
    #[error("device {device_type} is not registered")]
    DeviceNotRegistered { device_type: String },

    /// The device call itself failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl CaptureError {
    /// External code for the invalid spec version failure.
    pub const INVALID_SPEC_VERSION_CODE: &'static str = "101";

    /// External code for the unregistered device failure.
    pub const DEVICE_NOT_REGISTERED_CODE: &'static str = "102";

    /// Creates an invalid spec version error.
    pub fn invalid_spec_version(device_type: impl Into<String>) -> Self {
        Self::InvalidSpecVersion {
            device_type: device_type.into(),
        }
    }

    /// Creates a device not registered error.
    pub fn not_registered(device_type: impl Into<String>) -> Self {
        Self::DeviceNotRegistered {
            device_type: device_type.into(),
        }
    }

    /// Returns the external error code, if this failure has one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidSpecVersion { .. } => Some(Self::INVALID_SPEC_VERSION_CODE),
            Self::DeviceNotRegistered { .. } => Some(Self::DEVICE_NOT_REGISTERED_CODE),
            Self::Device(_) => None,
        }
    }
}
