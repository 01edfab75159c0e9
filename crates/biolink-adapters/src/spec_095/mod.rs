//! Adapter for spec version 0.9.5.
//!
//! Capture exchange:
//!
//! 1. `RCAPTURE` with a JSON body naming the device, instrument selector,
//!    timeout, requested score and exceptions.
//! 2. The device answers with one entry per captured biometric. Each entry
//!    carries an envelope whose payload holds the standard-base64 biometric
//!    value, an optional extracted template and a quality score.
//!
//! Entries the device could not capture come back with an empty `data`
//! field and an error block; they become non-captured samples rather than
//! failing the whole call.

mod dto;

use base64::Engine as _;
use biolink_core::envelope::{self, STANDARD_LENIENT, URL_SAFE_LENIENT};
use biolink_core::{BiometricSample, CaptureResult, DecodeError, DecodeResult, SUCCESS_CODE};
use tracing::{debug, trace};

use crate::adapter::{CaptureSpec, ProtocolAdapter};
use crate::error::DeviceResult;

use dto::{RCaptureData, RCaptureEntry, RCaptureRequest, RCaptureRequestBio, RCaptureResponse, StreamRequest};

/// Spec version string.
pub const SPEC_VERSION: &str = "0.9.5";

/// Error code recorded for entries that carry no payload and no code.
pub const NO_DATA_CODE: &str = "-1";

/// Adapter for 0.9.5 device services.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spec095Adapter;

impl Spec095Adapter {
    fn capture_request(spec: &CaptureSpec<'_>) -> RCaptureRequest {
        let request = spec.request;
        RCaptureRequest {
            env: request.environment.clone(),
            purpose: spec.purpose.clone(),
            spec_version: SPEC_VERSION.to_string(),
            timeout: request.timeout.as_millis().to_string(),
            capture_time: spec.capture_time.clone(),
            transaction_id: spec.transaction_id.clone(),
            bio: vec![RCaptureRequestBio {
                bio_type: spec.descriptor.device_type.clone(),
                count: "1".to_string(),
                bio_sub_type: None,
                exception: request.exceptions.clone(),
                requested_score: request.requested_score.to_string(),
                device_id: spec.descriptor.device_id.clone(),
                device_sub_id: spec.device_sub_id.clone(),
                previous_hash: None,
            }],
            custom_opts: None,
        }
    }
}

impl ProtocolAdapter for Spec095Adapter {
    fn spec_version(&self) -> &'static str {
        SPEC_VERSION
    }

    fn build_capture_request(&self, spec: &CaptureSpec<'_>) -> DeviceResult<Vec<u8>> {
        let body = Self::capture_request(spec);
        debug!(
            device_id = %spec.descriptor.device_id,
            device_sub_id = %spec.device_sub_id,
            transaction_id = %spec.transaction_id,
            "Built capture request"
        );
        Ok(serde_json::to_vec(&body)?)
    }

    fn parse_capture_response(&self, raw: &str) -> DeviceResult<CaptureResult> {
        let response: RCaptureResponse = serde_json::from_str(raw)?;
        let samples = response
            .into_entries()
            .into_iter()
            .map(parse_entry)
            .collect::<DecodeResult<Vec<_>>>()?;
        Ok(CaptureResult::new(samples))
    }

    fn build_stream_request(&self, device_id: &str, device_sub_id: &str) -> DeviceResult<Vec<u8>> {
        Ok(serde_json::to_vec(&StreamRequest {
            device_id,
            device_sub_id,
        })?)
    }
}

fn parse_entry(entry: RCaptureEntry) -> DecodeResult<BiometricSample> {
    let (code, info) = match entry.error {
        Some(e) => (
            Some(e.error_code).filter(|c| !c.is_empty()),
            Some(e.error_info).filter(|i| !i.is_empty()),
        ),
        None => (None, None),
    };
    let device_failed = code.as_deref().is_some_and(|c| c != SUCCESS_CODE);

    if entry.data.is_empty() || device_failed {
        let code = code
            .filter(|c| c != SUCCESS_CODE)
            .unwrap_or_else(|| NO_DATA_CODE.to_string());
        debug!(error_code = %code, "Device did not capture entry");
        return Ok(BiometricSample::failed(code, info));
    }

    let data: RCaptureData = envelope::decode(&entry.data)?;
    trace!(
        spec_version = %entry.spec_version,
        transaction_id = %data.transaction_id,
        hash_len = entry.hash.len(),
        "Decoded capture entry"
    );

    let value = match data.bio_value.as_deref() {
        Some(v) if !v.is_empty() => STANDARD_LENIENT.decode(v.trim())?,
        _ => Vec::new(),
    };
    let score = quality_score(data.quality_score.as_ref())?;

    let mut sample = BiometricSample::captured(data.bio_sub_type, value, score)
        .with_bio_type(data.bio_type)
        .with_error_code(code.unwrap_or_else(|| SUCCESS_CODE.to_string()));
    if let Some(extract) = data.bio_extract.as_deref().filter(|e| !e.is_empty()) {
        sample = sample.with_extract(URL_SAFE_LENIENT.decode(extract.trim())?);
    }
    sample.error_info = info;
    Ok(sample)
}

fn quality_score(raw: Option<&serde_json::Value>) -> DecodeResult<f64> {
    match raw {
        None | Some(serde_json::Value::Null) => Ok(0.0),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| DecodeError::invalid_field("qualityScore", n.to_string())),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(0.0),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| DecodeError::invalid_field("qualityScore", s.as_str())),
        Some(other) => Err(DecodeError::invalid_field("qualityScore", other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use biolink_core::{CaptureRequest, DeviceDescriptor, DeviceInfo};
    use serde_json::json;
    use std::time::Duration;

    fn descriptor() -> DeviceDescriptor {
        let identity = json!({
            "make": "Acme",
            "model": "Slab-4",
            "type": "Fingerprint",
            "deviceSubType": "Slab",
            "deviceProvider": "Acme Biometrics",
            "deviceProviderId": "acme",
            "dateTime": "2024-05-01T10:00:00Z"
        });
        let info = DeviceInfo {
            device_id: "dev-1".into(),
            spec_version: vec!["0.9.5".into()],
            digital_id: URL_SAFE_LENIENT.encode(identity.to_string()),
            ..Default::default()
        };
        DeviceDescriptor::from_info(&info, 4501, "http://127.0.0.1").unwrap()
    }

    fn data_envelope(value: &[u8], quality: serde_json::Value) -> String {
        envelope::encode(
            "hdr",
            &json!({
                "bioType": "Finger",
                "bioSubType": "Left IndexFinger",
                "bioValue": STANDARD_LENIENT.encode(value),
                "transactionId": "1234567890",
                "qualityScore": quality,
            }),
        )
        .unwrap()
    }

    #[test]
    fn capture_request_body() {
        let device = descriptor();
        let request = CaptureRequest::new("FINGERPRINT_SLAB_LEFT")
            .with_timeout(Duration::from_secs(10))
            .with_exceptions(vec!["LF_INDEX".into()])
            .with_environment("Staging");
        let spec = CaptureSpec::new(&device, &request, "1");

        insta::assert_json_snapshot!(Spec095Adapter::capture_request(&spec), {
            ".captureTime" => "[capture_time]",
            ".transactionId" => "[transaction_id]",
        }, @r#"
        {
          "env": "Staging",
          "purpose": "Registration",
          "specVersion": "0.9.5",
          "timeout": "10000",
          "captureTime": "[capture_time]",
          "transactionId": "[transaction_id]",
          "bio": [
            {
              "type": "Fingerprint",
              "count": "1",
              "bioSubType": null,
              "exception": [
                "LF_INDEX"
              ],
              "requestedScore": "40",
              "deviceId": "dev-1",
              "deviceSubId": "1",
              "previousHash": null
            }
          ],
          "customOpts": null
        }
        "#);
    }

    #[test]
    fn capture_request_serializes() {
        let device = descriptor();
        let request = CaptureRequest::new("IRIS_DOUBLE");
        let spec = CaptureSpec::new(&device, &request, "3").with_transaction_id("9876543210");

        let body = Spec095Adapter.build_capture_request(&spec).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["transactionId"], "9876543210");
        assert_eq!(value["bio"][0]["deviceSubId"], "3");
    }

    #[test]
    fn parses_wrapped_response() {
        let raw = json!({
            "biometrics": [{
                "specVersion": "0.9.5",
                "data": data_envelope(b"\x01\x02\x03", json!("87.5")),
                "hash": "abc",
                "error": { "errorCode": "0", "errorInfo": "Success" }
            }]
        })
        .to_string();

        let result = Spec095Adapter.parse_capture_response(&raw).unwrap();
        assert_eq!(result.len(), 1);
        let sample = &result.samples[0];
        assert!(sample.captured);
        assert_eq!(sample.bio_type, "Finger");
        assert_eq!(sample.bio_sub_type, "Left IndexFinger");
        assert_eq!(sample.value, vec![1, 2, 3]);
        assert_eq!(sample.quality_score, 87.5);
        assert_eq!(result.error_code(), None);
        assert_eq!(result.first_value(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn parses_bare_list_with_numeric_score() {
        let raw = json!([{ "data": data_envelope(b"x", json!(60)) }]).to_string();

        let result = Spec095Adapter.parse_capture_response(&raw).unwrap();
        assert_eq!(result.samples[0].quality_score, 60.0);
        assert_eq!(result.samples[0].error_code.as_deref(), Some("0"));
    }

    #[test]
    fn extract_is_decoded() {
        let data = envelope::encode(
            "hdr",
            &json!({
                "bioSubType": "Face",
                "bioValue": STANDARD_LENIENT.encode(b"img"),
                "bioExtract": URL_SAFE_LENIENT.encode(b"tpl"),
                "qualityScore": "90"
            }),
        )
        .unwrap();
        let raw = json!([{ "data": data }]).to_string();

        let result = Spec095Adapter.parse_capture_response(&raw).unwrap();
        assert_eq!(result.first_extract(), Some(&b"tpl"[..]));
    }

    #[test]
    fn device_error_entry_is_not_captured() {
        let raw = json!([{
            "data": "",
            "error": { "errorCode": "403", "errorInfo": "Device busy" }
        }])
        .to_string();

        let result = Spec095Adapter.parse_capture_response(&raw).unwrap();
        let sample = &result.samples[0];
        assert!(!sample.captured);
        assert_eq!(sample.error_code.as_deref(), Some("403"));
        assert_eq!(sample.error_info.as_deref(), Some("Device busy"));
        assert!(result.device_unavailable());
    }

    #[test]
    fn empty_entry_without_code() {
        let raw = json!([{ "data": "" }]).to_string();
        let result = Spec095Adapter.parse_capture_response(&raw).unwrap();
        assert_eq!(result.error_code(), Some(NO_DATA_CODE));
    }

    #[test]
    fn malformed_data_fails_the_call() {
        let raw = json!([{ "data": "no-delimiter" }]).to_string();
        let err = Spec095Adapter.parse_capture_response(&raw).unwrap_err();
        assert!(matches!(err, DeviceError::Decode(DecodeError::MalformedEnvelope)));
    }

    #[test]
    fn bad_quality_score_is_typed() {
        let raw = json!([{ "data": data_envelope(b"x", json!("high")) }]).to_string();
        let err = Spec095Adapter.parse_capture_response(&raw).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Decode(DecodeError::InvalidField { field: "qualityScore", .. })
        ));
    }

    #[test]
    fn non_json_response_fails() {
        let err = Spec095Adapter.parse_capture_response("oops").unwrap_err();
        assert!(matches!(err, DeviceError::Serialization(_)));
    }

    #[test]
    fn stream_request_body() {
        let body = Spec095Adapter.build_stream_request("dev-1", "2").unwrap();
        assert_eq!(body, br#"{"deviceId":"dev-1","deviceSubId":"2"}"#);
    }
}
