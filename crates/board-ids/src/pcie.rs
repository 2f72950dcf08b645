//! PCI identifiers and DFL feature IDs.
//!
//! Values match what `lspci -nn` reports for the cards and what the DFL
//! driver exposes under `dfl_dev.*/feature_id`.

/// Intel vendor ID (PCI-SIG assigned).
pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// Silicom vendor ID (PCI-SIG assigned).
pub const SILICOM_VENDOR_ID: u16 = 0x1C2C;

/// Device IDs of the supported boards.
pub mod device_id {
    /// Silicom N5010 SmartNIC (`lspci: 1c2c:1000`).
    pub const N5010: u16 = 0x1000;
    /// Silicom N5010 SmartNIC, second revision.
    pub const N5010_ALT: u16 = 0x1001;
    /// PAC with Arria 10 GX FPGA, physical function.
    pub const A10GX_PF: u16 = 0x09C4;
    /// PAC with Arria 10 GX FPGA, virtual function.
    pub const A10GX_VF: u16 = 0x09C5;
    /// PAC N3000, physical function.
    pub const N3000_PF: u16 = 0x0B30;
    /// PAC N3000, virtual function.
    pub const N3000_VF: u16 = 0x0B31;
    /// PAC D5005, physical function.
    pub const D5005_PF: u16 = 0x0B2B;
    /// PAC D5005, virtual function.
    pub const D5005_VF: u16 = 0x0B2C;
    /// Open FPGA Stack reference device (`lspci: 8086:af00`).
    pub const OFS_AF00: u16 = 0xAF00;
    /// Open FPGA Stack device (`lspci: 8086:bcce`).
    pub const OFS_BCCE: u16 = 0xBCCE;
}

/// Subsystem device IDs used to tell OFS boards apart.
pub mod subsystem_id {
    /// Generic OFS board.
    pub const OFS_GENERIC: u16 = 0x0000;
    /// OFS D5005 derivative.
    pub const OFS_D5005: u16 = 0x138D;
    /// N6000 ADP.
    pub const N6000: u16 = 0x1770;
    /// N6001 ADP.
    pub const N6001: u16 = 0x1771;
    /// C6100 ADP.
    pub const C6100: u16 = 0x17D4;
}

/// DFL feature IDs probed to disambiguate boards sharing vendor/device IDs.
pub mod feature_id {
    /// Max10 BMC reached over SPI (D5005 class boards).
    pub const MAX10_SPI: u16 = 0x0E;
    /// Max10 BMC reached over PMCI (N6000 class boards).
    pub const MAX10_PMCI: u16 = 0x12;
}

/// Format a `vendor:device` pair the way `lspci -d` expects it.
#[must_use]
pub fn lspci_filter(vendor_id: u16, device_id: u16) -> String {
    format!("{vendor_id:04x}:{device_id:04x}")
}
