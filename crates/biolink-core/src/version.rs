//! Spec version comparison and negotiation.
//!
//! Device services advertise the protocol versions they implement as
//! dot-separated strings ("0.9.2", "0.9.5"). Comparison walks both strings
//! segment by segment and stops at the first segment whose numeric value
//! differs.
//!
//! Strings with a different number of segments are compared by advancing
//! both cursors past each delimiter in lockstep. A side that has run out of
//! segments contributes zero, so "1.0.1" is newer than "1.0". Leading zeros
//! are not significant ("1.05" equals "1.5"), and non-digit characters are
//! folded in as raw offsets from `'0'` rather than rejected. Callers that
//! need strict semantics should validate the strings first.

use std::cmp::Ordering;

/// Compares two spec version strings.
///
/// Returns [`Ordering::Greater`] when `a` is newer than `b`.
pub fn compare(a: &str, b: &str) -> Ordering {
    if a.eq_ignore_ascii_case(b) {
        return Ordering::Equal;
    }

    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() || j < b.len() {
        let mut left: i32 = 0;
        let mut right: i32 = 0;

        while i < a.len() && a[i] != b'.' {
            left = left
                .wrapping_mul(10)
                .wrapping_add(i32::from(a[i]) - i32::from(b'0'));
            i += 1;
        }
        while j < b.len() && b[j] != b'.' {
            right = right
                .wrapping_mul(10)
                .wrapping_add(i32::from(b[j]) - i32::from(b'0'));
            j += 1;
        }

        match left.cmp(&right) {
            Ordering::Equal => {}
            other => return other,
        }

        i += 1;
        j += 1;
    }

    Ordering::Equal
}

/// Returns the newer of two versions; ties keep `a`.
pub fn newer<'a>(a: &'a str, b: &'a str) -> &'a str {
    if compare(a, b) == Ordering::Less { b } else { a }
}

/// Reduces a list of versions to the newest one.
///
/// Returns `None` for an empty list.
pub fn latest<S: AsRef<str>>(versions: &[S]) -> Option<&str> {
    let mut iter = versions.iter().map(|v| v.as_ref());
    let first = iter.next()?;
    Some(iter.fold(first, newer))
}

/// Picks the newest version advertised by the device that the client also
/// supports.
pub fn negotiate<S: AsRef<str>>(device_versions: &[S], supported: &[&str]) -> Option<String> {
    let common: Vec<&str> = device_versions
        .iter()
        .map(|v| v.as_ref())
        .filter(|v| supported.contains(v))
        .collect();
    latest(&common).map(str::to_string)
}
