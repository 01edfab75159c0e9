//! Envelope decoding for device responses.
//!
//! Device services wrap every self-description and every captured sample in
//! a delimited text envelope:
//!
//! ```text
//! +----------+---+---------------------------+---+-------------+
//! |  header  | . |  base64url(JSON payload)  | . |  signature  |
//! +----------+---+---------------------------+---+-------------+
//! ```
//!
//! The trailing signature segment is optional. Only the payload segment is
//! decoded; header and signature are not interpreted here.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{DecodeError, DecodeResult};

/// Payload segment: everything between the first delimiter and the next one.
static PAYLOAD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.]*\.([^.]+)").expect("Invalid envelope regex"));

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// URL-safe base64 that accepts padded and unpadded input.
pub const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Standard-alphabet base64 that accepts padded and unpadded input.
pub const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Extracts the raw payload segment from an envelope.
pub fn payload(raw: &str) -> DecodeResult<&str> {
    PAYLOAD_REGEX
        .captures(raw.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or(DecodeError::MalformedEnvelope)
}

/// Decodes the payload segment of an envelope into bytes.
pub fn decode_bytes(raw: &str) -> DecodeResult<Vec<u8>> {
    let segment = payload(raw)?;
    Ok(URL_SAFE_LENIENT.decode(segment)?)
}

/// Decodes an envelope into a typed record.
///
/// # Errors
///
/// - [`DecodeError::MalformedEnvelope`] when no payload segment exists
/// - [`DecodeError::Encoding`] when the payload is not base64url
/// - [`DecodeError::Schema`] when the JSON does not match `T`
pub fn decode<T: DeserializeOwned>(raw: &str) -> DecodeResult<T> {
    let bytes = decode_bytes(raw)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Decodes a bare base64url+JSON field (no header or signature).
pub fn decode_bare<T: DeserializeOwned>(raw: &str) -> DecodeResult<T> {
    let bytes = URL_SAFE_LENIENT.decode(raw.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Decodes a field that may be either a full envelope or a bare payload.
///
/// Some device services sign nested fields, others only encode them.
pub fn decode_nested<T: DeserializeOwned>(raw: &str) -> DecodeResult<T> {
    if raw.contains('.') {
        decode(raw)
    } else {
        decode_bare(raw)
    }
}

/// Wraps a value into an unsigned envelope with the given header.
pub fn encode<T: Serialize>(header: &str, value: &T) -> DecodeResult<String> {
    let json = serde_json::to_vec(value)?;
    Ok(format!("{}.{}", header, URL_SAFE_LENIENT.encode(json)))
}
