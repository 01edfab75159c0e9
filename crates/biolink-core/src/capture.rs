//! Capture requests and results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Device error codes meaning the device is busy, unavailable or gone.
pub const DEVICE_UNAVAILABLE_CODES: [&str; 3] = ["202", "403", "404"];

/// Device error code reported for a successful capture.
pub const SUCCESS_CODE: &str = "0";

/// A request to capture biometrics for one modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Raw device type or modality, e.g. `FINGERPRINT_SLAB_LEFT`.
    pub modality: String,
    /// Capture timeout requested from the device.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Biometric regions to skip (missing fingers, etc.).
    #[serde(default)]
    pub exceptions: Vec<String>,
    /// Minimum quality score the device should aim for.
    pub requested_score: u32,
    /// Deployment environment tag sent to the device.
    pub environment: String,
}

impl CaptureRequest {
    /// Default capture timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default requested quality score.
    pub const DEFAULT_REQUESTED_SCORE: u32 = 40;

    /// Creates a request for the given modality with default settings.
    pub fn new(modality: impl Into<String>) -> Self {
        Self {
            modality: modality.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            exceptions: Vec::new(),
            requested_score: Self::DEFAULT_REQUESTED_SCORE,
            environment: "Developer".to_string(),
        }
    }

    /// Builder: set the capture timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: set exception regions.
    pub fn with_exceptions(mut self, exceptions: Vec<String>) -> Self {
        self.exceptions = exceptions;
        self
    }

    /// Builder: set the requested quality score.
    pub fn with_requested_score(mut self, score: u32) -> Self {
        self.requested_score = score;
        self
    }

    /// Builder: set the environment tag.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// One captured biometric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricSample {
    /// Biometric type reported by the device.
    pub bio_type: String,
    /// Biometric sub-type, e.g. `Left IndexFinger`.
    pub bio_sub_type: String,
    /// Raw biometric value.
    pub value: Vec<u8>,
    /// Extracted template, when the device provides one.
    pub extract: Option<Vec<u8>>,
    /// Quality score reported by the device.
    pub quality_score: f64,
    /// Whether the sample was successfully captured and decoded.
    pub captured: bool,
    /// Device error code, when the device reported one.
    pub error_code: Option<String>,
    /// Device error message, when the device reported one.
    pub error_info: Option<String>,
}

impl BiometricSample {
    /// Creates a successfully captured sample.
    pub fn captured(bio_sub_type: impl Into<String>, value: Vec<u8>, quality_score: f64) -> Self {
        Self {
            bio_type: String::new(),
            bio_sub_type: bio_sub_type.into(),
            value,
            extract: None,
            quality_score,
            captured: true,
            error_code: None,
            error_info: None,
        }
    }

    /// Creates a sample for an entry the device failed to capture.
    pub fn failed(error_code: impl Into<String>, error_info: Option<String>) -> Self {
        Self {
            bio_type: String::new(),
            bio_sub_type: String::new(),
            value: Vec::new(),
            extract: None,
            quality_score: 0.0,
            captured: false,
            error_code: Some(error_code.into()),
            error_info,
        }
    }

    /// Builder: set the biometric type.
    pub fn with_bio_type(mut self, bio_type: impl Into<String>) -> Self {
        self.bio_type = bio_type.into();
        self
    }

    /// Builder: set the extracted template.
    pub fn with_extract(mut self, extract: Vec<u8>) -> Self {
        self.extract = Some(extract);
        self
    }

    /// Builder: set the device error code.
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }
}

/// Result of a capture call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub samples: Vec<BiometricSample>,
}

impl CaptureResult {
    /// Creates a result from samples.
    pub fn new(samples: Vec<BiometricSample>) -> Self {
        Self { samples }
    }

    /// Returns the first non-success device error code, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.samples
            .iter()
            .filter_map(|s| s.error_code.as_deref())
            .find(|code| *code != SUCCESS_CODE)
    }

    /// Returns true if the device reported itself busy or unavailable.
    pub fn device_unavailable(&self) -> bool {
        self.error_code()
            .is_some_and(|code| DEVICE_UNAVAILABLE_CODES.contains(&code))
    }

    /// Raw value of the first sample.
    pub fn first_value(&self) -> Option<&[u8]> {
        self.samples.first().map(|s| s.value.as_slice())
    }

    /// Extracted template of the first sample.
    pub fn first_extract(&self) -> Option<&[u8]> {
        self.samples.first().and_then(|s| s.extract.as_deref())
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let request = CaptureRequest::new("FINGERPRINT_SLAB_LEFT")
            .with_timeout(Duration::from_secs(5))
            .with_exceptions(vec!["LF_INDEX".into()])
            .with_requested_score(60)
            .with_environment("Staging");

        assert_eq!(request.modality, "FINGERPRINT_SLAB_LEFT");
        assert_eq!(request.timeout, Duration::from_secs(5));
        assert_eq!(request.exceptions, vec!["LF_INDEX".to_string()]);
        assert_eq!(request.requested_score, 60);
        assert_eq!(request.environment, "Staging");
    }

    #[test]
    fn request_timeout_serializes_as_millis() {
        let request = CaptureRequest::new("IRIS_DOUBLE").with_timeout(Duration::from_millis(1500));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["timeout"], 1500);

        let back: CaptureRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn error_code_skips_success() {
        let result = CaptureResult::new(vec![
            BiometricSample::captured("Left Thumb", vec![1], 80.0).with_error_code("0"),
            BiometricSample::failed("403", Some("busy".into())),
        ]);

        assert_eq!(result.error_code(), Some("403"));
        assert!(result.device_unavailable());
    }

    #[test]
    fn success_is_not_unavailable() {
        let result = CaptureResult::new(vec![
            BiometricSample::captured("Left Thumb", vec![1], 80.0).with_error_code("0"),
        ]);

        assert_eq!(result.error_code(), None);
        assert!(!result.device_unavailable());
    }

    #[test]
    fn first_value_and_extract() {
        let result = CaptureResult::new(vec![
            BiometricSample::captured("Face", vec![9, 8], 90.0).with_extract(vec![7]),
        ]);

        assert_eq!(result.first_value(), Some(&[9u8, 8][..]));
        assert_eq!(result.first_extract(), Some(&[7u8][..]));
        assert!(CaptureResult::default().first_value().is_none());
    }
}
