//! Device registry and discovery cache.
//!
//! Holds the two views discovery fills:
//! - canonical device type → descriptor (last write wins)
//! - modality key → spec version → descriptor (versions kept in first-seen order)
//!
//! It also remembers canonical types that a recent discovery failed to find,
//! so repeated lookups inside the miss window do not rescan every port.
//!
//! The registry itself is not synchronized; the manager keeps it behind a
//! `tokio::sync::RwLock`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use biolink_core::{DeviceDescriptor, canonicalize};
use tracing::{debug, trace};

/// Descriptors discovered for one modality, one per spec version.
#[derive(Debug, Clone, Default)]
struct ModalityEntry {
    versions: Vec<(String, DeviceDescriptor)>,
}

impl ModalityEntry {
    fn upsert(&mut self, spec_version: &str, descriptor: DeviceDescriptor) {
        match self.versions.iter_mut().find(|(v, _)| v == spec_version) {
            Some((_, existing)) => *existing = descriptor,
            None => self.versions.push((spec_version.to_string(), descriptor)),
        }
    }
}

/// Cache of discovered devices.
#[derive(Debug)]
pub struct DeviceRegistry {
    /// Canonical device type → descriptor.
    devices: HashMap<String, DeviceDescriptor>,
    /// Modality key → descriptors per spec version.
    modalities: HashMap<String, ModalityEntry>,
    /// Canonical device type → when its miss marker expires.
    misses: HashMap<String, Instant>,
    /// How long a miss marker lives.
    miss_ttl: Duration,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl DeviceRegistry {
    /// Creates an empty registry with the given miss window.
    pub fn new(miss_ttl: Duration) -> Self {
        Self {
            devices: HashMap::new(),
            modalities: HashMap::new(),
            misses: HashMap::new(),
            miss_ttl,
        }
    }

    /// Looks up the descriptor for a canonical device type.
    pub fn lookup(&self, canonical_type: &str) -> Option<DeviceDescriptor> {
        self.devices.get(canonical_type).cloned()
    }

    /// Records a descriptor for one of the spec versions it advertises.
    ///
    /// Re-inserting the same (modality, spec version) replaces the previous
    /// descriptor in place. Clears any miss marker for the device's type.
    pub fn insert(&mut self, spec_version: &str, descriptor: DeviceDescriptor) {
        let canonical = descriptor.registry_key();
        let modality = descriptor.modality_key();

        self.modalities
            .entry(modality.clone())
            .or_default()
            .upsert(spec_version, descriptor.clone());

        if self.devices.insert(canonical.clone(), descriptor).is_some() {
            trace!(device_type = %canonical, spec_version, "Replaced registry entry");
        } else {
            debug!(device_type = %canonical, modality = %modality, spec_version, "Inserted registry entry");
        }
        self.misses.remove(&canonical);
    }

    /// Removes the descriptor for a canonical device type.
    ///
    /// The modality view is left alone; only the type lookup is invalidated.
    pub fn remove(&mut self, canonical_type: &str) -> Option<DeviceDescriptor> {
        self.misses.remove(canonical_type);
        let removed = self.devices.remove(canonical_type);
        if removed.is_some() {
            debug!(device_type = %canonical_type, "Removed registry entry");
        }
        removed
    }

    /// Descriptors for a modality, in spec-version insertion order.
    ///
    /// `modality` may be a raw request type; it is canonicalized and
    /// lower-cased before lookup.
    pub fn by_modality(&self, modality: &str) -> Vec<DeviceDescriptor> {
        let key = canonicalize(modality).to_lowercase();
        self.modalities
            .get(&key)
            .map(|entry| entry.versions.iter().map(|(_, d)| d.clone()).collect())
            .unwrap_or_default()
    }

    /// Spec versions recorded for a modality, in insertion order.
    pub fn modality_versions(&self, modality: &str) -> Vec<String> {
        let key = canonicalize(modality).to_lowercase();
        self.modalities
            .get(&key)
            .map(|entry| entry.versions.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default()
    }

    /// Remembers that discovery found nothing for a canonical type.
    pub fn mark_miss(&mut self, canonical_type: &str) {
        self.misses
            .insert(canonical_type.to_string(), Instant::now() + self.miss_ttl);
        debug!(
            device_type = %canonical_type,
            ttl_secs = self.miss_ttl.as_secs(),
            "Marked device type as missing"
        );
    }

    /// Returns true if a miss marker for the type is still live.
    pub fn is_recent_miss(&self, canonical_type: &str) -> bool {
        self.misses
            .get(canonical_type)
            .is_some_and(|expires_at| Instant::now() < *expires_at)
    }

    /// Canonical types currently cached.
    pub fn device_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.devices.keys().cloned().collect();
        types.sort();
        types
    }

    /// Returns the number of cached device types.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns true if no device type is cached.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
