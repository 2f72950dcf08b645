//! Board platform table.
//!
//! Each [`PlatformEntry`] maps a PCI identity to the board support module
//! that knows how to report on it. The table is ordered and **first match
//! wins**: several OFS entries share a vendor/device pair and are told apart
//! only by the DFL feature the device exposes, so the order is part of the
//! contract and must not be re-sorted.

use crate::pcie::{device_id, feature_id, subsystem_id, INTEL_VENDOR_ID, SILICOM_VENDOR_ID};

/// Product string reported when no entry matches the full identity.
pub const FALLBACK_PRODUCT_NAME: &str = "Intel Acceleration Development Platform";

/// One row of the platform table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformEntry {
    /// PCI vendor ID.
    pub vendor_id: u16,
    /// PCI device ID.
    pub device_id: u16,
    /// PCI subsystem vendor ID.
    pub subsystem_vendor_id: u16,
    /// PCI subsystem device ID.
    pub subsystem_device_id: u16,
    /// DFL feature the device must expose for this entry to apply.
    pub feature_id: Option<u16>,
    /// Board support module file name, resolved against the search paths.
    pub module: &'static str,
    /// Human-readable product name.
    pub product_name: &'static str,
}

impl PlatformEntry {
    /// Entry that applies regardless of exposed features.
    #[must_use]
    pub const fn new(
        vendor_id: u16,
        device_id: u16,
        subsystem_vendor_id: u16,
        subsystem_device_id: u16,
        module: &'static str,
        product_name: &'static str,
    ) -> Self {
        Self {
            vendor_id,
            device_id,
            subsystem_vendor_id,
            subsystem_device_id,
            feature_id: None,
            module,
            product_name,
        }
    }

    /// Same entry, gated on the device exposing `feature`.
    #[must_use]
    pub const fn requires_feature(self, feature: u16) -> Self {
        Self {
            feature_id: Some(feature),
            ..self
        }
    }

    /// Vendor/device match, the key used for module resolution.
    #[must_use]
    pub const fn matches_pci(&self, vendor_id: u16, device_id: u16) -> bool {
        self.vendor_id == vendor_id && self.device_id == device_id
    }

    /// Exact four-key match, the key used for product names.
    #[must_use]
    pub const fn matches_exact(
        &self,
        vendor_id: u16,
        device_id: u16,
        subsystem_vendor_id: u16,
        subsystem_device_id: u16,
    ) -> bool {
        self.matches_pci(vendor_id, device_id)
            && self.subsystem_vendor_id == subsystem_vendor_id
            && self.subsystem_device_id == subsystem_device_id
    }
}

const N5010_NAME: &str = "Silicom FPGA SmartNIC N5010 Series";
const A10GX_NAME: &str = "Intel Programmable Acceleration Card with Intel Arria 10 GX FPGA";
const N3000_NAME: &str = "Intel FPGA Programmable Acceleration Card N3000";
const D5005_NAME: &str = "Intel FPGA Programmable Acceleration Card D5005";
const OFS_NAME: &str = "Intel Open FPGA Stack Platform";

/// Known boards, in match priority order.
#[rustfmt::skip]
pub const PLATFORM_TABLE: &[PlatformEntry] = &[
    PlatformEntry::new(SILICOM_VENDOR_ID, device_id::N5010, SILICOM_VENDOR_ID, 0, "libboard_n5010.so", N5010_NAME),
    PlatformEntry::new(SILICOM_VENDOR_ID, device_id::N5010_ALT, SILICOM_VENDOR_ID, 0, "libboard_n5010.so", N5010_NAME),
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::A10GX_PF, INTEL_VENDOR_ID, 0, "libboard_a10gx.so", A10GX_NAME),
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::A10GX_VF, INTEL_VENDOR_ID, 0, "libboard_a10gx.so", A10GX_NAME),
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::N3000_PF, INTEL_VENDOR_ID, 0, "libboard_n3000.so", N3000_NAME),
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::N3000_VF, INTEL_VENDOR_ID, 0, "libboard_n3000.so", N3000_NAME),
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::D5005_PF, INTEL_VENDOR_ID, 0, "libboard_d5005.so", D5005_NAME),
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::D5005_VF, INTEL_VENDOR_ID, 0, "libboard_d5005.so", D5005_NAME),
    // Max10 behind SPI
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::OFS_AF00, INTEL_VENDOR_ID, subsystem_id::OFS_GENERIC, "libboard_d5005.so", OFS_NAME)
        .requires_feature(feature_id::MAX10_SPI),
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::OFS_BCCE, INTEL_VENDOR_ID, subsystem_id::OFS_GENERIC, "libboard_d5005.so", OFS_NAME)
        .requires_feature(feature_id::MAX10_SPI),
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::OFS_BCCE, INTEL_VENDOR_ID, subsystem_id::OFS_D5005, "libboard_d5005.so", OFS_NAME)
        .requires_feature(feature_id::MAX10_SPI),
    // Max10 behind PMCI
    PlatformEntry::new(INTEL_VENDOR_ID, device_id::OFS_AF00, INTEL_VENDOR_ID, subsystem_id::OFS_GENERIC, "libboard_n6000.so", OFS_NAME)
        .requires_feature(feature_id::MAX10_PMCI),
    PlatformEntry::new(
        INTEL_VENDOR_ID,
        device_id::OFS_BCCE,
        INTEL_VENDOR_ID,
        subsystem_id::N6000,
        "libboard_n6000.so",
        "Intel Acceleration Development Platform N6000",
    )
    .requires_feature(feature_id::MAX10_PMCI),
    PlatformEntry::new(
        INTEL_VENDOR_ID,
        device_id::OFS_BCCE,
        INTEL_VENDOR_ID,
        subsystem_id::N6001,
        "libboard_n6000.so",
        "Intel Acceleration Development Platform N6001",
    )
    .requires_feature(feature_id::MAX10_PMCI),
    PlatformEntry::new(
        INTEL_VENDOR_ID,
        device_id::OFS_BCCE,
        INTEL_VENDOR_ID,
        subsystem_id::C6100,
        "libboard_n6000.so",
        "Intel Acceleration Development Platform C6100",
    )
    .requires_feature(feature_id::MAX10_PMCI),
];

/// Whether any entry claims this vendor/device pair.
#[must_use]
pub fn is_known_board(table: &[PlatformEntry], vendor_id: u16, device_id: u16) -> bool {
    table.iter().any(|e| e.matches_pci(vendor_id, device_id))
}
