//! Adapter for spec version 0.9.2.
//!
//! Devices still advertise 0.9.2, so negotiation may select it, but capture
//! and streaming are not driven for this version. Every operation fails with
//! [`DeviceError::NotImplemented`].

use biolink_core::CaptureResult;

use crate::adapter::{CaptureSpec, ProtocolAdapter};
use crate::error::{DeviceError, DeviceResult};

/// Spec version string.
pub const SPEC_VERSION: &str = "0.9.2";

/// Placeholder adapter for 0.9.2 device services.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spec092Adapter;

impl ProtocolAdapter for Spec092Adapter {
    fn spec_version(&self) -> &'static str {
        SPEC_VERSION
    }

    fn build_capture_request(&self, _spec: &CaptureSpec<'_>) -> DeviceResult<Vec<u8>> {
        Err(DeviceError::not_implemented(SPEC_VERSION, "capture"))
    }

    fn parse_capture_response(&self, _raw: &str) -> DeviceResult<CaptureResult> {
        Err(DeviceError::not_implemented(SPEC_VERSION, "capture"))
    }

    fn build_stream_request(&self, _device_id: &str, _device_sub_id: &str) -> DeviceResult<Vec<u8>> {
        Err(DeviceError::not_implemented(SPEC_VERSION, "stream"))
    }
}
