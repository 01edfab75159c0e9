//! Device-info and discovery wire formats.
//!
//! These two exchanges do not vary by spec version: every device service
//! answers device-info with a JSON array of envelopes, and discovery with a
//! plain JSON array of device records.

use biolink_core::{DecodeResult, DeviceInfo, DiscoveredDevice, envelope};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DeviceResult;

/// Error block a device may attach to any response entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceErrorInfo {
    pub error_code: String,
    pub error_info: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DeviceInfoEntry {
    device_info: String,
    error: Option<DeviceErrorInfo>,
}

/// Parses a device-info response.
///
/// The outer array must be valid JSON. Each entry's envelope is decoded on
/// its own so one bad record does not hide its siblings; entries without a
/// payload are skipped.
pub fn parse_device_info_response(raw: &str) -> DeviceResult<Vec<DecodeResult<DeviceInfo>>> {
    let entries: Vec<DeviceInfoEntry> = serde_json::from_str(raw)?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            if entry.device_info.is_empty() {
                debug!(error = ?entry.error, "Skipping device-info entry without payload");
                return None;
            }
            Some(envelope::decode::<DeviceInfo>(&entry.device_info))
        })
        .collect())
}

#[derive(Serialize)]
struct DiscoveryRequest<'a> {
    #[serde(rename = "type")]
    device_type: &'a str,
}

/// Serializes a discovery request for one device type.
pub fn build_discovery_request(device_type: &str) -> DeviceResult<Vec<u8>> {
    Ok(serde_json::to_vec(&DiscoveryRequest { device_type })?)
}

/// Parses a discovery response.
pub fn parse_discovery_response(raw: &str) -> DeviceResult<Vec<DiscoveredDevice>> {
    Ok(serde_json::from_str(raw)?)
}
