//! Wire types for the 0.9.5 capture and stream exchanges.

use serde::{Deserialize, Serialize};

use crate::info::DeviceErrorInfo;

/// Body of an `RCAPTURE` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RCaptureRequest {
    pub env: String,
    pub purpose: String,
    pub spec_version: String,
    /// Milliseconds, as a decimal string.
    pub timeout: String,
    pub capture_time: String,
    pub transaction_id: String,
    pub bio: Vec<RCaptureRequestBio>,
    pub custom_opts: Option<serde_json::Value>,
}

/// One modality entry in an `RCAPTURE` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RCaptureRequestBio {
    #[serde(rename = "type")]
    pub bio_type: String,
    pub count: String,
    pub bio_sub_type: Option<Vec<String>>,
    pub exception: Vec<String>,
    pub requested_score: String,
    pub device_id: String,
    pub device_sub_id: String,
    pub previous_hash: Option<String>,
}

/// Capture responses come either bare or wrapped in `biometrics`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RCaptureResponse {
    Wrapped { biometrics: Vec<RCaptureEntry> },
    List(Vec<RCaptureEntry>),
}

impl RCaptureResponse {
    pub fn into_entries(self) -> Vec<RCaptureEntry> {
        match self {
            Self::Wrapped { biometrics } => biometrics,
            Self::List(entries) => entries,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RCaptureEntry {
    pub spec_version: String,
    /// Envelope around [`RCaptureData`]; empty when the device failed.
    pub data: String,
    pub hash: String,
    pub error: Option<DeviceErrorInfo>,
}

/// Decoded payload of a capture entry.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RCaptureData {
    pub bio_type: String,
    pub bio_sub_type: String,
    pub bio_value: Option<String>,
    pub bio_extract: Option<String>,
    pub transaction_id: String,
    /// Devices send this as a numeric string; some send a number.
    pub quality_score: Option<serde_json::Value>,
}

/// Body of a `STREAM` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StreamRequest<'a> {
    pub device_id: &'a str,
    pub device_sub_id: &'a str,
}
