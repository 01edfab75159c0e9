//! Device transport and protocol adapters.
//!
//! This crate provides the layer between the device manager and the local
//! device services:
//!
//! - [`DeviceTransport`] - Network access to device services
//! - [`HttpTransport`] - The HTTP implementation with custom method tokens
//! - [`ProtocolAdapter`] - Per-spec-version request building and response parsing
//! - [`AdapterRegistry`] - Version negotiation and adapter lookup
//! - [`DeviceError`] - Error types for device operations
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────────┐
//!              │  DeviceManager   │
//!              └────────┬─────────┘
//!                       │ negotiate(spec versions)
//!                       ▼
//!              ┌──────────────────┐
//!              │ AdapterRegistry  │
//!              └────────┬─────────┘
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//! ┌─────────────────┐       ┌─────────────────┐
//! │ Spec092Adapter  │       │ Spec095Adapter  │
//! └─────────────────┘       └────────┬────────┘
//!                                    │ request body / raw response
//!                                    ▼
//!                           ┌─────────────────┐
//!                           │ DeviceTransport │
//!                           └────────┬────────┘
//!                                    ▼
//!                        http://127.0.0.1:<port>/<endpoint>
//! ```

pub mod adapter;
pub mod error;
pub mod http;
pub mod info;
pub mod spec_092;
pub mod spec_095;
pub mod transport;

// Re-export main types at crate root
pub use adapter::{
    AdapterRegistry, CaptureSpec, ProtocolAdapter, REGISTRATION_PURPOSE, generate_transaction_id,
};
pub use error::{DeviceError, DeviceResult};
pub use http::{HttpTransport, HttpTransportConfig};
pub use info::{
    DeviceErrorInfo, build_discovery_request, parse_device_info_response,
    parse_discovery_response,
};
pub use spec_092::Spec092Adapter;
pub use spec_095::Spec095Adapter;
pub use transport::{
    BoxFuture, CAPTURE_ENDPOINT, CAPTURE_METHOD, DEVICE_DISCOVERY_ENDPOINT, DEVICE_INFO_ENDPOINT,
    DEVICE_INFO_METHOD, DISCOVERY_METHOD, DeviceStream, DeviceTransport, STREAM_ENDPOINT,
    STREAM_METHOD,
};
