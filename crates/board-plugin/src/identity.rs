//! Device identity and the device-source contract
//!
//! A [`BoardDevice`] is anything that can answer the four PCI identity
//! queries, probe for a DFL feature, and hand board modules an opaque token.
//! [`crate::SysfsDevice`] is the Linux implementation; tests supply fakes.

use crate::error::{BoardError, Result};
use std::ffi::CStr;
use std::fmt;

/// Source of identity, feature and token information for one device
pub trait BoardDevice: Send + Sync {
    /// PCI vendor ID
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute cannot be read.
    fn vendor_id(&self) -> Result<u16>;

    /// PCI device ID
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute cannot be read.
    fn device_id(&self) -> Result<u16>;

    /// PCI subsystem vendor ID
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute cannot be read.
    fn subsystem_vendor_id(&self) -> Result<u16>;

    /// PCI subsystem device ID
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute cannot be read.
    fn subsystem_device_id(&self) -> Result<u16>;

    /// Whether the device exposes the DFL feature `feature_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the feature list cannot be read. Callers treat
    /// that the same as absence.
    fn has_feature(&self, feature_id: u16) -> Result<bool>;

    /// Token passed to board module entry points
    fn token(&self) -> &CStr;
}

/// Four-key PCI identity, read fresh for every lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// PCI vendor ID
    pub vendor_id: u16,
    /// PCI device ID
    pub device_id: u16,
    /// PCI subsystem vendor ID
    pub subsystem_vendor_id: u16,
    /// PCI subsystem device ID
    pub subsystem_device_id: u16,
}

impl DeviceIdentity {
    /// Read all four keys from `device`
    ///
    /// # Errors
    ///
    /// Returns `BoardError::InvalidArgument` if the token is empty or any
    /// key cannot be read.
    pub fn read(device: &dyn BoardDevice) -> Result<Self> {
        if device.token().to_bytes().is_empty() {
            return Err(BoardError::invalid_argument("Empty device token"));
        }

        let read = |what: &str, value: Result<u16>| {
            value.map_err(|e| {
                tracing::error!("Failed to get {what}: {e}");
                BoardError::invalid_argument(format!("Failed to get {what}: {e}"))
            })
        };

        Ok(Self {
            vendor_id: read("vendor ID", device.vendor_id())?,
            device_id: read("device ID", device.device_id())?,
            subsystem_vendor_id: read("subsystem vendor ID", device.subsystem_vendor_id())?,
            subsystem_device_id: read("subsystem device ID", device.subsystem_device_id())?,
        })
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} (subsystem {:04x}:{:04x})",
            self.vendor_id, self.device_id, self.subsystem_vendor_id, self.subsystem_device_id
        )
    }
}
