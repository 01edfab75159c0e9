//! Device type classification.
//!
//! Callers ask for devices with compound raw types such as
//! `FINGERPRINT_SLAB_LEFT_INDEX` or `FACE_FULL FACE`. The registry is keyed
//! by a shorter canonical type, and the part of the raw type beyond the
//! canonical prefix selects which instrument on a multi-instrument device
//! should capture.

/// Canonical type for slab (multi-finger) fingerprint scanners.
pub const FINGERPRINT_SLAB: &str = "FINGERPRINT_SLAB";

/// Canonical type for single-finger fingerprint scanners.
pub const FINGERPRINT_SINGLE: &str = "FINGERPRINT_SINGLE";

/// Canonical type for dual iris cameras.
pub const IRIS_DOUBLE: &str = "IRIS_DOUBLE";

/// Marker identifying full-face cameras in a raw type.
pub const FACE_FULL: &str = "FACE_FULL";

/// Canonical type for full-face cameras.
pub const FACE_FULL_FACE: &str = "FACE_FULL FACE";

/// Normalizes a raw device type to its canonical registry key.
///
/// Matching is substring based and checked in a fixed order: slab
/// fingerprint, then dual iris, then full face. Anything else is returned
/// unchanged.
pub fn canonicalize(raw: &str) -> String {
    if raw.contains(FINGERPRINT_SLAB) {
        FINGERPRINT_SLAB.to_string()
    } else if raw.contains(IRIS_DOUBLE) {
        IRIS_DOUBLE.to_string()
    } else if raw.contains(FACE_FULL) {
        FACE_FULL_FACE.to_string()
    } else {
        raw.to_string()
    }
}

/// Derives the device sub-identifier from a raw (uncanonicalized) type.
///
/// - slab fingerprint: whatever follows `FINGERPRINT_SLAB` (e.g. `LEFT`)
/// - single fingerprint: `SINGLE`
/// - dual iris: `DOUBLE`
/// - full face: whatever follows `FACE_FULL` (e.g. `FACE`)
/// - anything else: empty
///
/// A single `_` or space separating the prefix from the remainder is
/// dropped. A raw type that ends at the prefix yields an empty sub-id.
pub fn device_sub_id(raw: &str) -> String {
    match canonicalize(raw).as_str() {
        FINGERPRINT_SLAB => remainder_after(raw, FINGERPRINT_SLAB),
        FINGERPRINT_SINGLE => "SINGLE".to_string(),
        IRIS_DOUBLE => "DOUBLE".to_string(),
        FACE_FULL_FACE => remainder_after(raw, FACE_FULL),
        _ => String::new(),
    }
}

fn remainder_after(raw: &str, marker: &str) -> String {
    let Some(pos) = raw.find(marker) else {
        return String::new();
    };
    let rest = &raw[pos + marker.len()..];
    rest.strip_prefix(&['_', ' '][..]).unwrap_or(rest).to_string()
}

/// Picks the numeric sub-identifier used by bulk capture from the modality
/// text: `1` for left, `2` for right, `3` for everything else (both hands,
/// thumbs, double iris).
pub fn modality_sub_id(modality: &str) -> &'static str {
    let modality = modality.to_lowercase();
    if modality.contains("left") {
        "1"
    } else if modality.contains("right") {
        "2"
    } else {
        "3"
    }
}

/// Builds the canonical registry key for a device's type and sub-type.
///
/// `("Fingerprint", "Slab")` becomes `FINGERPRINT_SLAB`, and
/// `("Face", "Full face")` becomes `FACE_FULL FACE`.
pub fn registry_key(device_type: &str, sub_type: &str) -> String {
    canonicalize(&format!("{}_{}", device_type, sub_type).to_uppercase())
}

/// Builds the modality map key (lower-cased `type_subtype`).
pub fn modality_key(device_type: &str, sub_type: &str) -> String {
    format!("{}_{}", device_type, sub_type).to_lowercase()
}
