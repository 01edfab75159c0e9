//! ProtocolAdapter trait and the version-keyed adapter registry.
//!
//! Each spec version a device service may speak has one adapter that knows
//! how to build that version's request bodies and parse its responses. The
//! registry maps version strings to adapters and negotiates which one to use
//! for a given device.

use std::collections::HashMap;
use std::sync::Arc;

use biolink_core::{CaptureRequest, CaptureResult, DeviceDescriptor, version};
use rand::Rng;

use crate::error::{DeviceError, DeviceResult};
use crate::spec_092::Spec092Adapter;
use crate::spec_095::Spec095Adapter;

/// Purpose literal sent with registration captures.
pub const REGISTRATION_PURPOSE: &str = "Registration";

/// Everything an adapter needs to build one capture request.
#[derive(Debug, Clone)]
pub struct CaptureSpec<'a> {
    /// The device that will capture.
    pub descriptor: &'a DeviceDescriptor,
    /// The caller's request.
    pub request: &'a CaptureRequest,
    /// Instrument selector on the device.
    pub device_sub_id: String,
    /// Purpose literal.
    pub purpose: String,
    /// Correlation id for this call.
    pub transaction_id: String,
    /// Local ISO-8601 timestamp of the request.
    pub capture_time: String,
}

impl<'a> CaptureSpec<'a> {
    /// Creates a capture spec with a fresh correlation id and timestamp.
    pub fn new(
        descriptor: &'a DeviceDescriptor,
        request: &'a CaptureRequest,
        device_sub_id: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            request,
            device_sub_id: device_sub_id.into(),
            purpose: REGISTRATION_PURPOSE.to_string(),
            transaction_id: generate_transaction_id(),
            capture_time: local_timestamp(),
        }
    }

    /// Builder: set the purpose literal.
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    /// Builder: set the correlation id.
    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = id.into();
        self
    }
}

/// Generates a 10-digit correlation id with a non-zero leading digit.
pub fn generate_transaction_id() -> String {
    let mut rng = rand::rng();
    let mut id = String::with_capacity(10);
    id.push(char::from(b'0' + rng.random_range(1..=9u8)));
    for _ in 1..10 {
        id.push(char::from(b'0' + rng.random_range(0..=9u8)));
    }
    id
}

fn local_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.3f")
        .to_string()
}

/// Builds requests for, and parses responses from, one spec version.
///
/// Adapters for versions that are still advertised by devices but no longer
/// driven by this client return [`DeviceError::NotImplemented`] rather than
/// doing nothing.
pub trait ProtocolAdapter: Send + Sync {
    /// The spec version this adapter speaks.
    fn spec_version(&self) -> &'static str;

    /// Serializes a capture request body.
    fn build_capture_request(&self, spec: &CaptureSpec<'_>) -> DeviceResult<Vec<u8>>;

    /// Parses a raw capture response.
    fn parse_capture_response(&self, raw: &str) -> DeviceResult<CaptureResult>;

    /// Serializes a stream request body.
    fn build_stream_request(&self, device_id: &str, device_sub_id: &str) -> DeviceResult<Vec<u8>>;
}

/// Version-keyed set of adapters, built once at startup.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn ProtocolAdapter>>,
    order: Vec<&'static str>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("versions", &self.order)
            .finish()
    }
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Creates a registry with the built-in adapters (0.9.2 and 0.9.5).
    pub fn with_defaults() -> Self {
        Self::new()
            .with_adapter(Arc::new(Spec092Adapter))
            .with_adapter(Arc::new(Spec095Adapter))
    }

    /// Builder: register an adapter, replacing any for the same version.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        let version = adapter.spec_version();
        if self.adapters.insert(version, adapter).is_none() {
            self.order.push(version);
        }
        self
    }

    /// Versions with a registered adapter, in registration order.
    pub fn supported_versions(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    /// Looks up the adapter for an exact version.
    pub fn get(&self, spec_version: &str) -> DeviceResult<Arc<dyn ProtocolAdapter>> {
        self.adapters
            .get(spec_version)
            .cloned()
            .ok_or_else(|| DeviceError::UnsupportedSpecVersion(spec_version.to_string()))
    }

    /// Picks the adapter for the newest version both sides support.
    pub fn negotiate<S: AsRef<str>>(
        &self,
        device_versions: &[S],
    ) -> DeviceResult<Arc<dyn ProtocolAdapter>> {
        match version::negotiate(device_versions, &self.order) {
            Some(v) => self.get(&v),
            None => Err(DeviceError::UnsupportedSpecVersion(
                device_versions
                    .iter()
                    .map(|v| v.as_ref())
                    .collect::<Vec<_>>()
                    .join(","),
            )),
        }
    }
}
