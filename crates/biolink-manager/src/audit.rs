//! Audit notifications.
//!
//! Discovery and registry maintenance emit [`AuditEvent`]s. Recording is
//! fire-and-forget: a sink never blocks the caller and never fails it.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A notable device lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// A device service answered on a port.
    DeviceFound { port: u16 },
    /// Nothing answered on a port.
    NoDeviceAvailable { port: u16 },
    /// A device was added to the registry.
    DeviceRegistered { device_type: String, port: u16 },
    /// A device was removed from the registry.
    DeviceRemoved { device_type: String },
    /// A port answered but its response could not be used.
    ProbeFailed { port: u16, reason: String },
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceFound { port } => write!(f, "device found on port {}", port),
            Self::NoDeviceAvailable { port } => write!(f, "no device available on port {}", port),
            Self::DeviceRegistered { device_type, port } => {
                write!(f, "{} registered on port {}", device_type, port)
            }
            Self::DeviceRemoved { device_type } => write!(f, "{} removed", device_type),
            Self::ProbeFailed { port, reason } => write!(f, "probe on port {} failed: {}", port, reason),
        }
    }
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    /// Records an event. Must not block.
    fn record(&self, event: AuditEvent);
}

/// Logs audit events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match &event {
            AuditEvent::DeviceRegistered { .. } | AuditEvent::DeviceRemoved { .. } => {
                info!(target: "biolink_manager::audit", event = %event, "Audit");
            }
            AuditEvent::ProbeFailed { .. } => {
                warn!(target: "biolink_manager::audit", event = %event, "Audit");
            }
            _ => debug!(target: "biolink_manager::audit", event = %event, "Audit"),
        }
    }
}

/// Forwards audit events to a bounded channel.
///
/// Events are dropped when the channel is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    /// Creates a sink and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!(error = %e, "Dropped audit event");
        }
    }
}
