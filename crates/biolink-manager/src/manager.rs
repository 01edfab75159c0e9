//! The device manager: resolves devices and drives captures.
//!
//! Request paths look a device up in the registry and, on a miss, run an
//! on-demand discovery for that one device type before giving up. A device
//! that still cannot be found is reported as `None`, not as an error.

use std::sync::Arc;
use std::time::Duration;

use biolink_adapters::{
    AdapterRegistry, CaptureSpec, DeviceResult, DeviceStream, DeviceTransport, HttpTransport,
};
use biolink_core::{
    BiometricSample, CaptureRequest, CaptureResult, DeviceDescriptor, DiscoveredDevice,
    canonicalize, device_sub_id, modality_sub_id,
};
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::config::ManagerConfig;
use crate::discovery::{Discovery, DiscoveryHandle};
use crate::error::{CaptureError, ManagerResult, ScanResult};
use crate::registration::{AcceptAll, RegistrationCheck};
use crate::registry::DeviceRegistry;

/// Result of an authenticated scan.
#[derive(Debug)]
pub struct AuthenticatedScan {
    /// The capture result.
    pub result: CaptureResult,
    /// The live preview, unless the device reported itself unavailable.
    pub stream: Option<DeviceStream>,
}

/// Discovers local biometric devices and routes capture requests to them.
///
/// Cloning is cheap; clones share the registry and transport.
#[derive(Clone)]
pub struct DeviceManager {
    config: Arc<ManagerConfig>,
    adapters: AdapterRegistry,
    discovery: Discovery,
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("config", &self.config)
            .field("adapters", &self.adapters)
            .finish_non_exhaustive()
    }
}

impl DeviceManager {
    /// Creates a manager.
    pub fn new(
        config: ManagerConfig,
        transport: Arc<dyn DeviceTransport>,
        adapters: AdapterRegistry,
    ) -> Self {
        let discovery = Discovery::new(
            transport,
            DeviceRegistry::new(config.miss_ttl()),
            Arc::new(TracingAuditSink),
            Arc::new(AcceptAll),
            adapters.supported_versions(),
            config.running_url(),
            config.ports(),
        );

        Self {
            config: Arc::new(config),
            adapters,
            discovery,
        }
    }

    /// Creates a manager talking HTTP to the configured host with the
    /// built-in adapters.
    pub fn with_http(config: ManagerConfig) -> ManagerResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.transport_config())?;
        Ok(Self::new(
            config,
            Arc::new(transport),
            AdapterRegistry::with_defaults(),
        ))
    }

    /// Builder: set the audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.discovery.audit = sink;
        self
    }

    /// Builder: set the registration check.
    pub fn with_registration_check(mut self, check: Arc<dyn RegistrationCheck>) -> Self {
        self.discovery.registration = check;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Starts discovery on every configured port in the background.
    pub fn start(&self) -> DiscoveryHandle {
        self.discovery.start()
    }

    /// Builds a capture request carrying the configured environment tag.
    pub fn request(&self, modality: impl Into<String>) -> CaptureRequest {
        CaptureRequest::new(modality).with_environment(self.config.environment.clone())
    }

    /// Looks up a device by raw type, discovering it on a miss.
    pub async fn find_device(&self, raw_type: &str) -> Option<DeviceDescriptor> {
        let canonical = canonicalize(raw_type);
        let device = self.discovery.discover_for_type(&canonical).await?;
        Some(device.with_sub_id(device_sub_id(raw_type)))
    }

    /// Captures from the device matching `request.modality`.
    ///
    /// Returns `Ok(None)` when no such device can be found.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidSpecVersion`] if the device advertises no
    ///   supported spec version
    /// - [`CaptureError::DeviceNotRegistered`] if the device is not
    ///   registered at this workstation
    /// - [`CaptureError::Device`] if the capture call itself fails
    pub async fn scan(&self, request: &CaptureRequest) -> ScanResult<Option<CaptureResult>> {
        let Some(device) = self.find_device(&request.modality).await else {
            info!(modality = %request.modality, "Device not found for scan");
            return Ok(None);
        };

        let device_type = device.registry_key();
        if !device.spec_version_valid {
            return Err(CaptureError::invalid_spec_version(device_type));
        }
        if !device.registered {
            return Err(CaptureError::not_registered(device_type));
        }

        let result = self.capture(&device, request).await?;
        Ok(Some(result))
    }

    /// Opens the live preview, then captures.
    ///
    /// The preview is closed straight away when the device reports itself
    /// busy or unavailable. Registration and version checks are not applied.
    pub async fn authenticated_scan(
        &self,
        request: &CaptureRequest,
    ) -> ScanResult<Option<AuthenticatedScan>> {
        let Some(device) = self.find_device(&request.modality).await else {
            info!(modality = %request.modality, "Device not found for authenticated scan");
            return Ok(None);
        };

        let stream = match self.open_stream(&device).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(device_id = %device.device_id, error = %e, "Could not open preview");
                None
            }
        };

        let result = self.capture(&device, request).await?;

        let stream = if result.device_unavailable() {
            debug!(error_code = ?result.error_code(), "Device unavailable, closing preview");
            if let Some(stream) = stream {
                stream.close();
            }
            None
        } else {
            stream
        };

        Ok(Some(AuthenticatedScan { result, stream }))
    }

    /// Opens the live preview of the device matching a raw type.
    ///
    /// Returns `Ok(None)` when no such device can be found.
    pub async fn stream(&self, raw_type: &str) -> ScanResult<Option<DeviceStream>> {
        let Some(device) = self.find_device(raw_type).await else {
            info!(device_type = %raw_type, "Device not found for stream");
            return Ok(None);
        };
        Ok(Some(self.open_stream(&device).await?))
    }

    /// Opens the live preview of the first device recorded for a modality.
    pub async fn modality_stream(&self, modality: &str) -> ScanResult<Option<DeviceStream>> {
        let Some(device) = self.first_by_modality(modality).await else {
            return Ok(None);
        };
        let device = device.with_sub_id(modality_sub_id(modality));
        Ok(Some(self.open_stream(&device).await?))
    }

    /// Captures from the first device recorded for a modality.
    ///
    /// Picks the first candidate in spec-version insertion order. Returns
    /// an empty list when no device is recorded for the modality.
    pub async fn bulk_capture(&self, request: &CaptureRequest) -> ScanResult<Vec<BiometricSample>> {
        let Some(device) = self.first_by_modality(&request.modality).await else {
            info!(modality = %request.modality, "No device for bulk capture");
            return Ok(Vec::new());
        };
        let device = device.with_sub_id(modality_sub_id(&request.modality));

        let result = self.capture(&device, request).await?;
        Ok(result.samples)
    }

    /// Removes a device from the registry and clears its miss marker.
    pub async fn deregister(&self, raw_type: &str) -> Option<DeviceDescriptor> {
        let canonical = canonicalize(raw_type);
        let removed = self.discovery.registry.write().await.remove(&canonical);
        if removed.is_some() {
            info!(device_type = %canonical, "Deregistered device");
            self.discovery.audit.record(AuditEvent::DeviceRemoved {
                device_type: canonical,
            });
        }
        removed
    }

    /// Re-probes the port the cached device for a raw type runs on.
    ///
    /// Does nothing when the type is not cached.
    pub async fn refresh_device(&self, raw_type: &str) {
        let canonical = canonicalize(raw_type);
        let port = self
            .discovery
            .registry
            .read()
            .await
            .lookup(&canonical)
            .map(|device| device.running_port);

        if let Some(port) = port {
            info!(device_type = %canonical, port, "Refreshing device");
            self.discovery.discover_port(port, None).await;
        }
    }

    /// Device id of the first device recorded for a modality.
    pub async fn device_id_by_modality(&self, modality: &str) -> Option<String> {
        self.discovery
            .registry
            .read()
            .await
            .by_modality(modality)
            .into_iter()
            .next()
            .map(|device| device.device_id)
    }

    /// Asks the device services which devices of a type they expose.
    pub async fn device_discovery(&self, device_type: &str) -> DeviceResult<Vec<DiscoveredDevice>> {
        self.discovery.device_discovery(device_type).await
    }

    /// Canonical device types currently cached.
    pub async fn device_types(&self) -> Vec<String> {
        self.discovery.registry.read().await.device_types()
    }

    async fn first_by_modality(&self, modality: &str) -> Option<DeviceDescriptor> {
        let first = self
            .discovery
            .registry
            .read()
            .await
            .by_modality(modality)
            .into_iter()
            .next();
        match first {
            Some(device) => Some(device),
            None => {
                self.discovery
                    .discover_for_type(&canonicalize(modality))
                    .await?;
                self.discovery
                    .registry
                    .read()
                    .await
                    .by_modality(modality)
                    .into_iter()
                    .next()
            }
        }
    }

    /// HTTP deadline for a capture call: the capture window the device was
    /// asked to honour plus the configured request timeout.
    fn capture_deadline(&self, request: &CaptureRequest) -> Duration {
        request.timeout.saturating_add(self.config.request_timeout())
    }

    #[tracing::instrument(
        skip_all,
        fields(device_id = %device.device_id, port = device.running_port)
    )]
    async fn capture(
        &self,
        device: &DeviceDescriptor,
        request: &CaptureRequest,
    ) -> DeviceResult<CaptureResult> {
        let adapter = self.adapters.negotiate(&device.spec_versions)?;
        let sub_id = device.device_sub_id.clone().unwrap_or_default();
        let spec = CaptureSpec::new(device, request, sub_id).with_purpose(self.config.purpose.clone());
        let body = adapter.build_capture_request(&spec)?;

        let deadline = self.capture_deadline(request);
        info!(
            spec_version = adapter.spec_version(),
            transaction_id = %spec.transaction_id,
            deadline_ms = deadline.as_millis() as u64,
            "Capturing"
        );

        let raw = self
            .discovery
            .transport
            .capture(device.running_port, body, deadline)
            .await?;
        let result = adapter.parse_capture_response(&raw)?;
        debug!(samples = result.len(), error_code = ?result.error_code(), "Capture finished");
        Ok(result)
    }

    async fn open_stream(&self, device: &DeviceDescriptor) -> DeviceResult<DeviceStream> {
        let adapter = self.adapters.negotiate(&device.spec_versions)?;
        let sub_id = device.device_sub_id.as_deref().unwrap_or_default();
        let body = adapter.build_stream_request(&device.device_id, sub_id)?;

        debug!(
            device_id = %device.device_id,
            port = device.running_port,
            spec_version = adapter.spec_version(),
            "Opening stream"
        );
        self.discovery.transport.stream(device.running_port, body).await
    }
}
