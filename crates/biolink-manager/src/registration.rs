//! Workstation registration check.

use biolink_core::DeviceDescriptor;

/// Decides whether a discovered device may be used at this workstation.
///
/// Consulted once when a descriptor enters the registry; the answer is
/// stored in [`DeviceDescriptor::registered`].
pub trait RegistrationCheck: Send + Sync {
    /// Returns true if the device is registered.
    fn is_registered(&self, device: &DeviceDescriptor) -> bool;
}

/// Treats every device as registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RegistrationCheck for AcceptAll {
    fn is_registered(&self, _device: &DeviceDescriptor) -> bool {
        true
    }
}

/// Accepts only devices whose id is in a fixed list.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    device_ids: Vec<String>,
}

impl AllowList {
    /// Creates an allow list.
    pub fn new<I, S>(device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device_ids: device_ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl RegistrationCheck for AllowList {
    fn is_registered(&self, device: &DeviceDescriptor) -> bool {
        self.device_ids.iter().any(|id| *id == device.device_id)
    }
}
