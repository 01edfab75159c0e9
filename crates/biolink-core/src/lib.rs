//! Core types: device descriptors, envelopes, spec versions, classification.
//!
//! Everything in this crate is pure: no network, no shared state. The
//! adapters and manager crates build on it.

pub mod capture;
pub mod classify;
pub mod device;
pub mod envelope;
pub mod error;
pub mod tracing;
pub mod version;

pub use capture::{
    BiometricSample, CaptureRequest, CaptureResult, DEVICE_UNAVAILABLE_CODES, SUCCESS_CODE,
};
pub use classify::{canonicalize, device_sub_id, modality_key, modality_sub_id, registry_key};
pub use device::{DeviceDescriptor, DeviceInfo, DigitalIdentity, DiscoveredDevice};
pub use error::{DecodeError, DecodeResult};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
