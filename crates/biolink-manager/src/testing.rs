//! Test fixtures and a scripted in-memory transport.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use biolink_adapters::{
    BoxFuture, CAPTURE_METHOD, DEVICE_INFO_METHOD, DISCOVERY_METHOD, DeviceError, DeviceResult,
    DeviceStream, DeviceTransport, STREAM_METHOD,
};
use biolink_core::envelope::{self, STANDARD_LENIENT, URL_SAFE_LENIENT};
use biolink_core::{DeviceDescriptor, DeviceInfo};
use bytes::Bytes;
use serde_json::{Value, json};

/// Bare base64url digital identity for a type and sub-type.
pub fn identity(device_type: &str, sub_type: &str) -> String {
    let value = json!({
        "serialNo": "SN-001",
        "make": "Acme",
        "model": "M1",
        "type": device_type,
        "deviceSubType": sub_type,
        "deviceProvider": "Acme Biometrics",
        "deviceProviderId": "acme",
        "dateTime": "2024-05-01T10:00:00Z"
    });
    URL_SAFE_LENIENT.encode(value.to_string())
}

/// A device-info response entry.
pub fn info_entry(device_id: &str, device_type: &str, sub_type: &str, versions: &[&str]) -> Value {
    let info = json!({
        "deviceId": device_id,
        "firmware": "1.0",
        "certification": "L0",
        "serviceVersion": "1.0",
        "specVersion": versions,
        "purpose": "Registration",
        "deviceCode": format!("code-{}", device_id),
        "digitalId": identity(device_type, sub_type),
        "deviceStatus": "Ready",
        "env": "Developer"
    });
    json!({ "deviceInfo": envelope::encode("hdr", &info).unwrap() })
}

/// A full device-info response.
pub fn info_response(entries: Vec<Value>) -> String {
    Value::Array(entries).to_string()
}

/// A registered, version-valid descriptor advertising 0.9.5.
pub fn descriptor(device_id: &str, device_type: &str, sub_type: &str, port: u16) -> DeviceDescriptor {
    let info = DeviceInfo {
        device_id: device_id.to_string(),
        spec_version: vec!["0.9.5".to_string()],
        digital_id: identity(device_type, sub_type),
        ..Default::default()
    };
    let mut device = DeviceDescriptor::from_info(&info, port, "http://127.0.0.1").unwrap();
    device.registered = true;
    device.spec_version_valid = true;
    device
}

/// A 0.9.5 capture response with one entry.
pub fn capture_response(error_code: &str, value: &[u8]) -> String {
    let data = if error_code == "0" {
        envelope::encode(
            "hdr",
            &json!({
                "bioType": "Finger",
                "bioSubType": "Left IndexFinger",
                "bioValue": STANDARD_LENIENT.encode(value),
                "qualityScore": "80"
            }),
        )
        .unwrap()
    } else {
        String::new()
    };
    json!([{
        "specVersion": "0.9.5",
        "data": data,
        "hash": "",
        "error": { "errorCode": error_code, "errorInfo": "" }
    }])
    .to_string()
}

/// One recorded transport call.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub port: u16,
    pub body: Vec<u8>,
    pub deadline: Option<Duration>,
}

/// Scripted [`DeviceTransport`] that records every call.
///
/// Ports without a scripted device-info or discovery response refuse
/// connections.
#[derive(Default)]
pub struct FakeTransport {
    infos: HashMap<u16, String>,
    discoveries: HashMap<u16, String>,
    captures: HashMap<u16, String>,
    streams: HashMap<u16, Vec<Bytes>>,
    probe_delay: Option<Duration>,
    capture_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, port: u16, raw: impl Into<String>) -> Self {
        self.infos.insert(port, raw.into());
        self
    }

    pub fn with_discovery(mut self, port: u16, raw: impl Into<String>) -> Self {
        self.discoveries.insert(port, raw.into());
        self
    }

    pub fn with_capture(mut self, port: u16, raw: impl Into<String>) -> Self {
        self.captures.insert(port, raw.into());
        self
    }

    pub fn with_stream(mut self, port: u16, chunks: Vec<Bytes>) -> Self {
        self.streams.insert(port, chunks);
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    /// Delays every capture answer; the call's deadline still applies.
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = Some(delay);
        self
    }

    /// Deadline passed with the most recent capture call.
    pub fn last_capture_deadline(&self) -> Option<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.method == CAPTURE_METHOD)
            .and_then(|c| c.deadline)
    }

    /// Number of calls made with a method token.
    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Body of the most recent call with a method token, as JSON.
    pub fn last_body(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.method == method)
            .map(|c| serde_json::from_slice(&c.body).unwrap())
    }

    /// Ports called with a method token, in call order.
    pub fn ports(&self, method: &str) -> Vec<u16> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.port)
            .collect()
    }

    fn record(&self, method: &'static str, port: u16, body: Vec<u8>) {
        self.record_with_deadline(method, port, body, None);
    }

    fn record_with_deadline(
        &self,
        method: &'static str,
        port: u16,
        body: Vec<u8>,
        deadline: Option<Duration>,
    ) {
        self.calls.lock().unwrap().push(Call {
            method,
            port,
            body,
            deadline,
        });
    }

    fn answers(&self, port: u16) -> bool {
        self.infos.contains_key(&port) || self.discoveries.contains_key(&port)
    }
}

impl DeviceTransport for FakeTransport {
    fn probe(&self, port: u16) -> BoxFuture<'_, DeviceResult<()>> {
        Box::pin(async move {
            if let Some(delay) = self.probe_delay {
                tokio::time::sleep(delay).await;
            }
            self.record(DEVICE_INFO_METHOD, port, Vec::new());
            if self.answers(port) {
                Ok(())
            } else {
                Err(DeviceError::unavailable(port, "connection refused"))
            }
        })
    }

    fn device_info(&self, port: u16) -> BoxFuture<'_, DeviceResult<String>> {
        Box::pin(async move {
            self.infos
                .get(&port)
                .cloned()
                .ok_or_else(|| DeviceError::unavailable(port, "connection refused"))
        })
    }

    fn discover(&self, port: u16, body: Vec<u8>) -> BoxFuture<'_, DeviceResult<String>> {
        Box::pin(async move {
            self.record(DISCOVERY_METHOD, port, body);
            self.discoveries
                .get(&port)
                .cloned()
                .ok_or_else(|| DeviceError::unavailable(port, "connection refused"))
        })
    }

    fn capture(
        &self,
        port: u16,
        body: Vec<u8>,
        deadline: Duration,
    ) -> BoxFuture<'_, DeviceResult<String>> {
        Box::pin(async move {
            self.record_with_deadline(CAPTURE_METHOD, port, body, Some(deadline));
            if let Some(delay) = self.capture_delay {
                tokio::time::timeout(deadline, tokio::time::sleep(delay))
                    .await
                    .map_err(|_| DeviceError::timeout(CAPTURE_METHOD))?;
            }
            self.captures.get(&port).cloned().ok_or(DeviceError::Http {
                status: 500,
                body: "no capture scripted".into(),
            })
        })
    }

    fn stream(&self, port: u16, body: Vec<u8>) -> BoxFuture<'_, DeviceResult<DeviceStream>> {
        Box::pin(async move {
            self.record(STREAM_METHOD, port, body);
            self.streams
                .get(&port)
                .cloned()
                .map(DeviceStream::from_chunks)
                .ok_or_else(|| DeviceError::unavailable(port, "connection refused"))
        })
    }
}
