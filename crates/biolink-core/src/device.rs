//! Device descriptors and the self-description records they are built from.

use serde::{Deserialize, Serialize};

use crate::classify;
use crate::envelope;
use crate::error::DecodeResult;

/// Signed identity block of a device, nested inside its device info.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DigitalIdentity {
    /// Device serial number.
    pub serial_no: Option<String>,
    /// Device make.
    pub make: String,
    /// Device model.
    pub model: String,
    /// Modality type, e.g. `Fingerprint`, `Iris`, `Face`.
    #[serde(rename = "type")]
    pub device_type: String,
    /// Modality sub-type, e.g. `Slab`, `Single`, `Double`, `Full face`.
    #[serde(alias = "subType")]
    pub device_sub_type: String,
    /// Name of the device provider.
    pub device_provider: String,
    /// Identifier of the device provider.
    pub device_provider_id: String,
    /// Timestamp the identity was issued at, as reported by the device.
    pub date_time: String,
}

/// Decoded payload of one device-info envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceInfo {
    pub device_id: String,
    pub firmware: String,
    pub certification: String,
    pub service_version: String,
    /// Spec versions the device service implements.
    pub spec_version: Vec<String>,
    pub purpose: String,
    pub device_code: String,
    /// Nested base64url (optionally enveloped) [`DigitalIdentity`].
    pub digital_id: String,
    pub device_status: Option<String>,
    pub env: Option<String>,
}

impl DeviceInfo {
    /// Decodes the nested digital identity.
    pub fn digital_identity(&self) -> DecodeResult<DigitalIdentity> {
        envelope::decode_nested(&self.digital_id)
    }
}

/// A biometric device discovered on a local port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub device_code: String,
    /// Modality type from the digital identity.
    pub device_type: String,
    /// Modality sub-type from the digital identity.
    pub device_sub_type: String,
    /// Port the device service listens on.
    pub running_port: u16,
    /// Base URL of the device service, without port.
    pub running_url: String,
    pub firmware: String,
    pub certification: String,
    pub service_version: String,
    /// Spec versions advertised by the device.
    pub spec_versions: Vec<String>,
    pub purpose: String,
    pub provider_name: String,
    pub provider_id: String,
    pub model: String,
    pub make: String,
    pub timestamp: String,
    pub digital_identity: DigitalIdentity,
    /// Whether the device is registered for use at this workstation.
    pub registered: bool,
    /// Whether at least one advertised spec version is supported.
    pub spec_version_valid: bool,
    /// Instrument selector for the next capture, attached per request.
    pub device_sub_id: Option<String>,
}

impl DeviceDescriptor {
    /// Builds a descriptor from a decoded device-info record.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the nested digital identity is invalid.
    pub fn from_info(info: &DeviceInfo, port: u16, running_url: &str) -> DecodeResult<Self> {
        let identity = info.digital_identity()?;

        Ok(Self {
            device_id: info.device_id.clone(),
            device_code: info.device_code.clone(),
            device_type: identity.device_type.clone(),
            device_sub_type: identity.device_sub_type.clone(),
            running_port: port,
            running_url: running_url.to_string(),
            firmware: info.firmware.clone(),
            certification: info.certification.clone(),
            service_version: info.service_version.clone(),
            spec_versions: info.spec_version.clone(),
            purpose: info.purpose.clone(),
            provider_name: identity.device_provider.clone(),
            provider_id: identity.device_provider_id.clone(),
            model: identity.model.clone(),
            make: identity.make.clone(),
            timestamp: identity.date_time.clone(),
            digital_identity: identity,
            registered: false,
            spec_version_valid: false,
            device_sub_id: None,
        })
    }

    /// Canonical registry key, e.g. `FINGERPRINT_SLAB`.
    pub fn registry_key(&self) -> String {
        classify::registry_key(&self.device_type, &self.device_sub_type)
    }

    /// Modality map key, e.g. `fingerprint_slab`.
    pub fn modality_key(&self) -> String {
        classify::modality_key(&self.device_type, &self.device_sub_type)
    }

    /// Marks the descriptor valid if any advertised version is supported.
    pub fn check_for_spec(&mut self, supported: &[&str]) {
        self.spec_version_valid = self
            .spec_versions
            .iter()
            .any(|v| supported.contains(&v.as_str()));
    }

    /// Returns a copy carrying the given instrument selector.
    pub fn with_sub_id(&self, sub_id: impl Into<String>) -> Self {
        Self {
            device_sub_id: Some(sub_id.into()),
            ..self.clone()
        }
    }

    /// Full URL of an endpoint on this device's service.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}:{}/{}", self.running_url, self.running_port, endpoint)
    }
}

/// A device reported by the discovery endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveredDevice {
    pub device_id: String,
    pub device_status: String,
    pub certification: String,
    pub service_version: String,
    pub device_sub_id: Vec<String>,
    pub callback_id: String,
    pub digital_id: String,
    pub device_code: String,
    pub spec_version: Vec<String>,
    pub purpose: String,
}

impl DiscoveredDevice {
    /// Decodes the nested digital identity.
    pub fn digital_identity(&self) -> DecodeResult<DigitalIdentity> {
        envelope::decode_nested(&self.digital_id)
    }
}
