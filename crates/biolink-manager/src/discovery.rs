//! Port scanning and device discovery.
//!
//! A scan probes every configured port concurrently. Each probe:
//!
//! 1. sends the device-info method to check that something is listening
//! 2. fetches and decodes the device-info envelopes
//! 3. builds one descriptor per device and records it under every spec
//!    version it advertises
//!
//! Failures on one port are logged and audited and never affect sibling
//! probes. Background scans run in a `JoinSet` that can be awaited or
//! cancelled through a [`DiscoveryHandle`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use biolink_adapters::{
    DeviceResult, DeviceTransport, build_discovery_request, parse_device_info_response,
    parse_discovery_response,
};
use biolink_core::{DeviceDescriptor, DiscoveredDevice};
use tokio::sync::{Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

use crate::audit::{AuditEvent, AuditSink};
use crate::registration::RegistrationCheck;
use crate::registry::DeviceRegistry;
use crate::shutdown::{ShutdownHandle, ShutdownSignal};

/// What a single port probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortOutcome {
    /// A device service answered; these canonical types were recorded.
    Devices(Vec<String>),
    /// Nothing answered.
    Unavailable,
    /// Something answered but the response was unusable.
    Failed(String),
}

/// Aggregated outcome of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// (port, canonical type) for every recorded device.
    pub devices: Vec<(u16, String)>,
    /// Ports where nothing answered.
    pub unavailable: Vec<u16>,
    /// Ports whose response could not be used, with the reason.
    pub failed: Vec<(u16, String)>,
    /// Probes aborted by shutdown.
    pub cancelled: usize,
}

impl DiscoveryReport {
    fn record(&mut self, port: u16, outcome: PortOutcome) {
        match outcome {
            PortOutcome::Devices(types) => {
                self.devices.extend(types.into_iter().map(|t| (port, t)));
            }
            PortOutcome::Unavailable => self.unavailable.push(port),
            PortOutcome::Failed(reason) => self.failed.push((port, reason)),
        }
    }

    /// Number of ports that were probed to completion.
    pub fn completed(&self) -> usize {
        let answered: std::collections::HashSet<u16> =
            self.devices.iter().map(|(port, _)| *port).collect();
        answered.len() + self.unavailable.len() + self.failed.len()
    }
}

/// Handle to a background scan started by
/// [`DeviceManager::start`](crate::DeviceManager::start).
///
/// Dropping the handle leaves the scan running to completion.
#[derive(Debug)]
pub struct DiscoveryHandle {
    shutdown: ShutdownHandle,
    task: JoinHandle<DiscoveryReport>,
}

impl DiscoveryHandle {
    /// Waits for every probe to finish.
    pub async fn wait(self) -> DiscoveryReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Discovery task failed");
                DiscoveryReport::default()
            }
        }
    }

    /// Cancels in-flight probes and returns what completed so far.
    pub async fn shutdown(self) -> DiscoveryReport {
        self.shutdown.trigger();
        self.wait().await
    }

    /// Returns true once the scan has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

type InflightGates = HashMap<String, Arc<Mutex<()>>>;

/// Drops a type's gate from the in-flight map when the scan holding it
/// ends, whether it completes or its future is dropped.
struct InflightEntry {
    inflight: Arc<StdMutex<InflightGates>>,
    key: String,
    gate: Arc<Mutex<()>>,
}

impl Drop for InflightEntry {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if inflight
            .get(&self.key)
            .is_some_and(|gate| Arc::ptr_eq(gate, &self.gate))
        {
            inflight.remove(&self.key);
        }
    }
}

/// Shared discovery state: transport, registry and collaborators.
#[derive(Clone)]
pub(crate) struct Discovery {
    pub transport: Arc<dyn DeviceTransport>,
    pub registry: Arc<RwLock<DeviceRegistry>>,
    pub audit: Arc<dyn AuditSink>,
    pub registration: Arc<dyn RegistrationCheck>,
    /// Spec versions with a registered adapter.
    pub supported: Arc<[&'static str]>,
    pub running_url: String,
    pub ports: Arc<[u16]>,
    /// One gate per canonical type with an on-demand scan in flight.
    inflight: Arc<StdMutex<InflightGates>>,
}

impl Discovery {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        registry: DeviceRegistry,
        audit: Arc<dyn AuditSink>,
        registration: Arc<dyn RegistrationCheck>,
        supported: Vec<&'static str>,
        running_url: String,
        ports: Vec<u16>,
    ) -> Self {
        Self {
            transport,
            registry: Arc::new(RwLock::new(registry)),
            audit,
            registration,
            supported: supported.into(),
            running_url,
            ports: ports.into(),
            inflight: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Starts a background scan of every configured port.
    pub fn start(&self) -> DiscoveryHandle {
        let shutdown = ShutdownHandle::new();
        let signal = shutdown.signal();
        let discovery = self.clone();
        let task = tokio::spawn(async move { discovery.scan(None, signal).await });
        DiscoveryHandle { shutdown, task }
    }

    /// Probes every configured port concurrently, optionally keeping only
    /// one canonical device type.
    pub async fn scan(&self, filter: Option<String>, shutdown: ShutdownSignal) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        if self.ports.is_empty() {
            debug!("Discovery disabled, no ports configured");
            return report;
        }

        info!(
            ports = self.ports.len(),
            device_type = filter.as_deref().unwrap_or("*"),
            "Starting discovery"
        );

        let mut probes = JoinSet::new();
        for &port in self.ports.iter() {
            let discovery = self.clone();
            let filter = filter.clone();
            probes.spawn(async move {
                let outcome = discovery.discover_port(port, filter.as_deref()).await;
                (port, outcome)
            });
        }

        let shutdown = shutdown.wait();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                joined = probes.join_next() => match joined {
                    Some(Ok((port, outcome))) => report.record(port, outcome),
                    Some(Err(e)) => error!(error = %e, "Probe task failed"),
                    None => break,
                },
                _ = &mut shutdown => {
                    report.cancelled = probes.len();
                    probes.abort_all();
                    info!(cancelled = report.cancelled, "Discovery cancelled");
                    break;
                }
            }
        }

        info!(
            devices = report.devices.len(),
            unavailable = report.unavailable.len(),
            failed = report.failed.len(),
            "Discovery finished"
        );
        report
    }

    /// Probes one port and records what it finds.
    #[tracing::instrument(skip(self))]
    pub async fn discover_port(&self, port: u16, filter: Option<&str>) -> PortOutcome {
        trace!(port, "Probing port");

        if let Err(e) = self.transport.probe(port).await {
            debug!(port, error = %e, "No device service on port");
            self.audit.record(AuditEvent::NoDeviceAvailable { port });
            return PortOutcome::Unavailable;
        }
        self.audit.record(AuditEvent::DeviceFound { port });

        let raw = match self.transport.device_info(port).await {
            Ok(raw) => raw,
            Err(e) => return self.failed(port, e.to_string()),
        };
        let infos = match parse_device_info_response(&raw) {
            Ok(infos) => infos,
            Err(e) => return self.failed(port, e.to_string()),
        };

        let mut recorded = Vec::new();
        for info in infos {
            let info = match info {
                Ok(info) => info,
                Err(e) => {
                    self.failed(port, e.to_string());
                    continue;
                }
            };
            let mut device = match DeviceDescriptor::from_info(&info, port, &self.running_url) {
                Ok(device) => device,
                Err(e) => {
                    self.failed(port, e.to_string());
                    continue;
                }
            };

            let device_type = device.registry_key();
            if filter.is_some_and(|wanted| wanted != device_type) {
                trace!(port, device_type = %device_type, "Skipping device of other type");
                continue;
            }
            if info.spec_version.is_empty() {
                debug!(port, device_type = %device_type, "Device advertises no spec version");
                continue;
            }

            device.check_for_spec(&self.supported);
            device.registered = self.registration.is_registered(&device);

            {
                let mut registry = self.registry.write().await;
                for version in &info.spec_version {
                    registry.insert(version, device.clone());
                }
            }

            info!(
                port,
                device_type = %device_type,
                device_id = %device.device_id,
                registered = device.registered,
                spec_version_valid = device.spec_version_valid,
                "Recorded device"
            );
            self.audit.record(AuditEvent::DeviceRegistered {
                device_type: device_type.clone(),
                port,
            });
            recorded.push(device_type);
        }

        PortOutcome::Devices(recorded)
    }

    fn failed(&self, port: u16, reason: String) -> PortOutcome {
        warn!(port, reason = %reason, "Discarding unusable device response");
        self.audit.record(AuditEvent::ProbeFailed {
            port,
            reason: reason.clone(),
        });
        PortOutcome::Failed(reason)
    }

    /// Looks up a canonical type, scanning for it on a miss.
    ///
    /// Concurrent misses for the same type share one scan. A scan that
    /// finds nothing is remembered for the registry's miss window.
    pub async fn discover_for_type(&self, canonical_type: &str) -> Option<DeviceDescriptor> {
        if let Some(found) = self.cached(canonical_type).await? {
            return Some(found);
        }

        let gate = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(canonical_type.to_string())
            .or_default()
            .clone();
        let _lock = gate.lock().await;
        let _entry = InflightEntry {
            inflight: Arc::clone(&self.inflight),
            key: canonical_type.to_string(),
            gate: Arc::clone(&gate),
        };

        // Another caller may have finished the scan while we waited.
        if let Some(found) = self.cached(canonical_type).await? {
            return Some(found);
        }

        self.scan(Some(canonical_type.to_string()), ShutdownHandle::new().signal())
            .await;

        let mut registry = self.registry.write().await;
        let found = registry.lookup(canonical_type);
        if found.is_none() {
            registry.mark_miss(canonical_type);
        }
        found
    }

    #[cfg(test)]
    fn inflight_types(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// `None` when the type is inside its miss window, `Some(None)` when
    /// a scan is needed.
    async fn cached(&self, canonical_type: &str) -> Option<Option<DeviceDescriptor>> {
        let registry = self.registry.read().await;
        if let Some(found) = registry.lookup(canonical_type) {
            return Some(Some(found));
        }
        if registry.is_recent_miss(canonical_type) {
            debug!(device_type = %canonical_type, "Inside miss window, not rescanning");
            return None;
        }
        Some(None)
    }

    /// Asks each port in turn to list devices of a type; the first port
    /// that answers wins.
    pub async fn device_discovery(&self, device_type: &str) -> DeviceResult<Vec<DiscoveredDevice>> {
        let body = build_discovery_request(device_type)?;

        for &port in self.ports.iter() {
            let raw = match self.transport.discover(port, body.clone()).await {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(port, error = %e, "No discovery answer");
                    self.audit.record(AuditEvent::NoDeviceAvailable { port });
                    continue;
                }
            };

            match parse_discovery_response(&raw) {
                Ok(devices) => {
                    info!(port, device_type, count = devices.len(), "Discovery answered");
                    self.audit.record(AuditEvent::DeviceFound { port });
                    return Ok(devices);
                }
                Err(e) => {
                    self.failed(port, e.to_string());
                }
            }
        }

        debug!(device_type, "No port answered discovery");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ChannelAuditSink;
    use crate::registration::{AcceptAll, AllowList};
    use crate::testing::{FakeTransport, info_entry, info_response};
    use biolink_adapters::{DEVICE_INFO_METHOD, DISCOVERY_METHOD};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn discovery(
        transport: FakeTransport,
        ports: Vec<u16>,
    ) -> (Discovery, Arc<FakeTransport>, mpsc::Receiver<AuditEvent>) {
        let transport = Arc::new(transport);
        let (sink, rx) = ChannelAuditSink::new(64);
        let discovery = Discovery::new(
            transport.clone(),
            DeviceRegistry::new(Duration::from_secs(60)),
            Arc::new(sink),
            Arc::new(AcceptAll),
            vec!["0.9.2", "0.9.5"],
            "http://127.0.0.1".into(),
            ports,
        );
        (discovery, transport, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<AuditEvent>) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn scan_records_every_version() {
        let transport = FakeTransport::new().with_info(
            4501,
            info_response(vec![info_entry("fp", "Fingerprint", "Slab", &["0.9.2", "0.9.5"])]),
        );
        let (discovery, _, mut rx) = discovery(transport, vec![4501, 4502]);

        let report = discovery.start().wait().await;
        assert_eq!(report.devices, vec![(4501, "FINGERPRINT_SLAB".to_string())]);
        assert_eq!(report.unavailable, vec![4502]);
        assert_eq!(report.completed(), 2);

        let registry = discovery.registry.read().await;
        let device = registry.lookup("FINGERPRINT_SLAB").unwrap();
        assert!(device.registered);
        assert!(device.spec_version_valid);
        assert_eq!(device.running_port, 4501);
        assert_eq!(registry.modality_versions("FINGERPRINT_SLAB"), vec!["0.9.2", "0.9.5"]);

        let events = drain(&mut rx);
        assert!(events.contains(&AuditEvent::DeviceFound { port: 4501 }));
        assert!(events.contains(&AuditEvent::NoDeviceAvailable { port: 4502 }));
        assert!(events.contains(&AuditEvent::DeviceRegistered {
            device_type: "FINGERPRINT_SLAB".into(),
            port: 4501
        }));
    }

    #[tokio::test]
    async fn rescan_is_idempotent() {
        let transport = FakeTransport::new().with_info(
            4501,
            info_response(vec![info_entry("iris", "Iris", "Double", &["0.9.5"])]),
        );
        let (discovery, _, _rx) = discovery(transport, vec![4501]);

        discovery.start().wait().await;
        discovery.start().wait().await;

        let registry = discovery.registry.read().await;
        assert_eq!(registry.by_modality("IRIS_DOUBLE").len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn bad_entries_are_skipped() {
        let raw = json!([
            { "deviceInfo": "garbage" },
            info_entry("face", "Face", "Full face", &["0.9.5"]),
        ])
        .to_string();
        let transport = FakeTransport::new()
            .with_info(4501, raw)
            .with_info(4502, "not json");
        let (discovery, _, mut rx) = discovery(transport, vec![4501, 4502]);

        let report = discovery.start().wait().await;
        assert_eq!(report.devices, vec![(4501, "FACE_FULL FACE".to_string())]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 4502);
        assert!(discovery.registry.read().await.lookup("FACE_FULL FACE").is_some());

        let failures = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, AuditEvent::ProbeFailed { .. }))
            .count();
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn unsupported_versions_and_registration_flags() {
        let transport = FakeTransport::new().with_info(
            4501,
            info_response(vec![info_entry("fp", "Fingerprint", "Slab", &["1.0"])]),
        );
        let (mut discovery, _, _rx) = discovery(transport, vec![4501]);
        discovery.registration = Arc::new(AllowList::new(["someone-else"]));

        discovery.start().wait().await;

        let device = discovery.registry.read().await.lookup("FINGERPRINT_SLAB").unwrap();
        assert!(!device.spec_version_valid);
        assert!(!device.registered);
    }

    #[tokio::test]
    async fn filtered_scan_keeps_one_type() {
        let raw = info_response(vec![
            info_entry("fp", "Fingerprint", "Slab", &["0.9.5"]),
            info_entry("iris", "Iris", "Double", &["0.9.5"]),
        ]);
        let (discovery, _, _rx) = discovery(FakeTransport::new().with_info(4501, raw), vec![4501]);

        let found = discovery.discover_for_type("IRIS_DOUBLE").await.unwrap();
        assert_eq!(found.device_id, "iris");

        let registry = discovery.registry.read().await;
        assert!(registry.lookup("FINGERPRINT_SLAB").is_none());
    }

    #[tokio::test]
    async fn miss_window_suppresses_rescans() {
        let (discovery, transport, _rx) = discovery(FakeTransport::new(), vec![4501, 4502]);

        assert!(discovery.discover_for_type("IRIS_DOUBLE").await.is_none());
        assert_eq!(transport.count(DEVICE_INFO_METHOD), 2);

        assert!(discovery.discover_for_type("IRIS_DOUBLE").await.is_none());
        assert_eq!(transport.count(DEVICE_INFO_METHOD), 2);

        // A different type has its own window.
        assert!(discovery.discover_for_type("FINGERPRINT_SLAB").await.is_none());
        assert_eq!(transport.count(DEVICE_INFO_METHOD), 4);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_scan() {
        let transport = FakeTransport::new().with_probe_delay(Duration::from_millis(20));
        let (discovery, transport, _rx) = discovery(transport, vec![4501]);

        let (a, b, c) = tokio::join!(
            discovery.discover_for_type("IRIS_DOUBLE"),
            discovery.discover_for_type("IRIS_DOUBLE"),
            discovery.discover_for_type("IRIS_DOUBLE"),
        );
        assert!(a.is_none() && b.is_none() && c.is_none());
        assert_eq!(transport.count(DEVICE_INFO_METHOD), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_lookup_releases_its_gate() {
        let transport = FakeTransport::new().with_probe_delay(Duration::from_secs(30));
        let (discovery, _, _rx) = discovery(transport, vec![4501]);

        let lookup = tokio::time::timeout(
            Duration::from_secs(1),
            discovery.discover_for_type("IRIS_DOUBLE"),
        )
        .await;
        assert!(lookup.is_err());
        assert_eq!(discovery.inflight_types(), 0);
    }

    #[tokio::test]
    async fn finished_lookup_releases_its_gate() {
        let (discovery, _, _rx) = discovery(FakeTransport::new(), vec![4501]);

        assert!(discovery.discover_for_type("IRIS_DOUBLE").await.is_none());
        assert_eq!(discovery.inflight_types(), 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_in_flight_probes() {
        let transport = FakeTransport::new().with_probe_delay(Duration::from_secs(30));
        let (discovery, _, _rx) = discovery(transport, vec![4501, 4502, 4503]);

        let handle = discovery.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = handle.shutdown().await;

        assert_eq!(report.cancelled, 3);
        assert_eq!(report.completed(), 0);
    }

    #[tokio::test]
    async fn no_ports_no_scan() {
        let (discovery, transport, _rx) = discovery(FakeTransport::new(), Vec::new());
        let report = discovery.start().wait().await;
        assert_eq!(report, DiscoveryReport::default());
        assert_eq!(transport.count(DEVICE_INFO_METHOD), 0);
    }

    #[tokio::test]
    async fn device_discovery_first_answer_wins() {
        let listing = json!([{ "deviceId": "fp", "deviceStatus": "Ready" }]).to_string();
        let transport = FakeTransport::new()
            .with_discovery(4502, listing.clone())
            .with_discovery(4503, listing);
        let (discovery, transport, mut rx) = discovery(transport, vec![4501, 4502, 4503]);

        let devices = discovery.device_discovery("Fingerprint").await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, "fp");
        assert_eq!(transport.ports(DISCOVERY_METHOD), vec![4501, 4502]);
        assert_eq!(
            transport.last_body(DISCOVERY_METHOD),
            Some(json!({ "type": "Fingerprint" }))
        );

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                AuditEvent::NoDeviceAvailable { port: 4501 },
                AuditEvent::DeviceFound { port: 4502 },
            ]
        );
    }

    #[tokio::test]
    async fn device_discovery_without_answers_is_empty() {
        let (discovery, _, _rx) = discovery(FakeTransport::new(), vec![4501]);
        assert!(discovery.device_discovery("Iris").await.unwrap().is_empty());
    }
}
