//! Device manager: discovery, registry, capture orchestration.
//!
//! This crate provides the stateful half of biolink:
//! - Concurrent port scanning for local device services
//! - A device registry with on-demand rediscovery and a miss window
//! - Capture, authenticated capture, bulk capture and live streams
//! - Audit notifications for device lifecycle events
//!
//! # Example
//!
//! ```rust,no_run
//! use biolink_manager::{DeviceManager, ManagerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DeviceManager::with_http(ManagerConfig::default())?;
//!     let report = manager.start().wait().await;
//!     println!("found {} devices", report.devices.len());
//!
//!     let request = manager.request("FINGERPRINT_SLAB_LEFT");
//!     if let Some(result) = manager.scan(&request).await? {
//!         println!("captured {} samples", result.len());
//!     }
//!     Ok(())
//! }
//! ```

mod audit;
mod config;
mod discovery;
mod error;
mod manager;
mod registration;
mod registry;
mod shutdown;
#[cfg(test)]
mod testing;

pub use audit::{AuditEvent, AuditSink, ChannelAuditSink, TracingAuditSink};
pub use config::ManagerConfig;
pub use discovery::{DiscoveryHandle, DiscoveryReport, PortOutcome};
pub use error::{CaptureError, ManagerError, ManagerResult, ScanResult};
pub use manager::{AuthenticatedScan, DeviceManager};
pub use registration::{AcceptAll, AllowList, RegistrationCheck};
pub use registry::DeviceRegistry;
pub use shutdown::{ShutdownHandle, ShutdownSignal};
