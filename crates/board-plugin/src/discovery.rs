//! Runtime device discovery
//!
//! Finds FPGA boards by scanning PCIe sysfs and exposes each one as a
//! [`SysfsDevice`], the Linux [`BoardDevice`] implementation.

use crate::config::BoardConfig;
use crate::error::{BoardError, Result};
use crate::identity::{BoardDevice, DeviceIdentity};
use board_ids::platform::is_known_board;
use board_ids::PLATFORM_TABLE;
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

/// Device manager for runtime discovery
#[derive(Debug)]
pub struct DeviceManager {
    devices: Vec<SysfsDevice>,
}

/// One PCIe function backed by `/sys/bus/pci/devices/<addr>`
#[derive(Debug, Clone)]
pub struct SysfsDevice {
    /// PCIe bus address (0000:b1:00.0, etc.)
    pcie_address: String,

    /// sysfs directory of the function
    path: PathBuf,

    /// NUL-terminated PCIe address handed to board modules
    token: CString,
}

impl DeviceManager {
    /// Discover all FPGA boards on the system
    ///
    /// A PCIe function qualifies when its vendor/device pair appears in the
    /// platform table or when it exposes an `fpga_region` directory.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::NoDevicesFound` if no boards are detected, or an
    /// I/O error if the PCI device directory cannot be read.
    pub fn discover(config: &BoardConfig) -> Result<Self> {
        let pci_devices_path = config.pci_devices_dir();
        tracing::info!("Discovering FPGA boards under {}", pci_devices_path.display());

        let mut devices = Vec::new();

        for entry in std::fs::read_dir(&pci_devices_path)?.flatten() {
            let path = entry.path();

            let vendor_id = read_hex_sysfs(&path.join("vendor"))
                .ok()
                .and_then(|v| u16::try_from(v).ok());
            let device_id = read_hex_sysfs(&path.join("device"))
                .ok()
                .and_then(|v| u16::try_from(v).ok());

            let (Some(vendor), Some(device)) = (vendor_id, device_id) else {
                tracing::debug!("Skipping {}: unreadable PCI IDs", path.display());
                continue;
            };

            if !is_known_board(PLATFORM_TABLE, vendor, device) && !path.join("fpga_region").is_dir()
            {
                continue;
            }

            let pcie_address = entry.file_name().to_string_lossy().to_string();
            tracing::debug!("Found board {vendor:04x}:{device:04x} @ {pcie_address}");

            match SysfsDevice::at(pcie_address, path) {
                Ok(dev) => devices.push(dev),
                Err(e) => tracing::warn!("Skipping device: {e}"),
            }
        }

        if devices.is_empty() {
            tracing::error!("No FPGA boards found");
            return Err(BoardError::NoDevicesFound);
        }

        // Sort to ensure consistent ordering
        devices.sort_by(|a, b| a.pcie_address.cmp(&b.pcie_address));

        tracing::info!("Discovered {} board(s)", devices.len());

        Ok(Self { devices })
    }

    /// Get number of discovered devices
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Get slice of all devices
    #[must_use]
    pub fn devices(&self) -> &[SysfsDevice] {
        &self.devices
    }

    /// Get device by PCIe address
    ///
    /// # Errors
    ///
    /// Returns `BoardError::InvalidArgument` if no discovered device has that address.
    pub fn find(&self, pcie_address: &str) -> Result<&SysfsDevice> {
        self.devices
            .iter()
            .find(|d| d.pcie_address == pcie_address)
            .ok_or_else(|| BoardError::invalid_argument(format!("Device not found: {pcie_address}")))
    }
}

impl SysfsDevice {
    /// Open the PCIe function at `pcie_address`
    ///
    /// # Errors
    ///
    /// Returns `BoardError::InvalidArgument` if the function does not exist.
    pub fn open(config: &BoardConfig, pcie_address: &str) -> Result<Self> {
        let path = config.pci_devices_dir().join(pcie_address);
        if !path.is_dir() {
            return Err(BoardError::invalid_argument(format!(
                "No PCI device at {}",
                path.display()
            )));
        }
        Self::at(pcie_address.to_string(), path)
    }

    fn at(pcie_address: String, path: PathBuf) -> Result<Self> {
        let token = CString::new(pcie_address.clone())
            .map_err(|e| BoardError::invalid_argument(format!("Bad PCIe address: {e}")))?;
        Ok(Self {
            pcie_address,
            path,
            token,
        })
    }

    /// Get PCIe address
    #[must_use]
    pub fn pcie_address(&self) -> &str {
        &self.pcie_address
    }

    /// Get sysfs path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the four-key identity
    ///
    /// # Errors
    ///
    /// Returns an error if any identity attribute is unreadable.
    pub fn identity(&self) -> Result<DeviceIdentity> {
        DeviceIdentity::read(self)
    }

    /// DFL feature IDs exposed by the FME
    ///
    /// Walks `fpga_region/region*/dfl-fme.*/dfl_dev.*/feature_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has no readable `fpga_region`.
    pub fn feature_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();

        for region in subdirs(&self.path.join("fpga_region"), "region")? {
            for fme in subdirs(&region, "dfl-fme.").unwrap_or_default() {
                for dev in subdirs(&fme, "dfl_dev.").unwrap_or_default() {
                    match read_hex_sysfs(&dev.join("feature_id")) {
                        Ok(id) => ids.push(id),
                        Err(e) => tracing::debug!("{e}"),
                    }
                }
            }
        }

        Ok(ids)
    }

    fn read_id(&self, attr: &str) -> Result<u16> {
        let value = read_hex_sysfs(&self.path.join(attr))?;
        u16::try_from(value).map_err(|_| {
            BoardError::invalid_argument(format!("{attr} out of range: {value:#x}"))
        })
    }
}

impl BoardDevice for SysfsDevice {
    fn vendor_id(&self) -> Result<u16> {
        self.read_id("vendor")
    }

    fn device_id(&self) -> Result<u16> {
        self.read_id("device")
    }

    fn subsystem_vendor_id(&self) -> Result<u16> {
        self.read_id("subsystem_vendor")
    }

    fn subsystem_device_id(&self) -> Result<u16> {
        self.read_id("subsystem_device")
    }

    fn has_feature(&self, feature_id: u16) -> Result<bool> {
        Ok(self.feature_ids()?.contains(&u64::from(feature_id)))
    }

    fn token(&self) -> &CStr {
        &self.token
    }
}

/// Entries of `dir` whose names start with `prefix`, sorted
fn subdirs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .map(|e| e.path())
        .collect();
    found.sort();
    Ok(found)
}

/// Read a hexadecimal value from sysfs
fn read_hex_sysfs(path: &Path) -> Result<u64> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BoardError::invalid_argument(format!("Cannot read {}: {e}", path.display()))
    })?;

    let trimmed = content.trim().trim_start_matches("0x");

    u64::from_str_radix(trimmed, 16).map_err(|e| {
        BoardError::invalid_argument(format!("Invalid hex value in {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_function(root: &Path, addr: &str, ids: [&str; 4]) -> PathBuf {
        let dir = root.join("bus/pci/devices").join(addr);
        fs::create_dir_all(&dir).unwrap();
        for (attr, value) in ["vendor", "device", "subsystem_vendor", "subsystem_device"]
            .iter()
            .zip(ids)
        {
            fs::write(dir.join(attr), format!("{value}\n")).unwrap();
        }
        dir
    }

    fn add_feature(dev: &Path, fme: &str, index: u32, feature: &str) {
        let dir = dev
            .join("fpga_region/region0")
            .join(fme)
            .join(format!("dfl_dev.{index}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("feature_id"), format!("{feature}\n")).unwrap();
    }

    fn config_for(root: &TempDir) -> BoardConfig {
        BoardConfig {
            sysfs_root: root.path().to_path_buf(),
            ..BoardConfig::default()
        }
    }

    #[test]
    fn reads_identity_from_sysfs() {
        let root = TempDir::new().unwrap();
        fake_function(root.path(), "0000:b1:00.0", ["0x8086", "0xbcce", "0x8086", "0x1771"]);

        let dev = SysfsDevice::open(&config_for(&root), "0000:b1:00.0").unwrap();
        let identity = dev.identity().unwrap();
        assert_eq!(identity.vendor_id, 0x8086);
        assert_eq!(identity.device_id, 0xbcce);
        assert_eq!(identity.subsystem_device_id, 0x1771);
        assert_eq!(dev.token().to_str().unwrap(), "0000:b1:00.0");
    }

    #[test]
    fn missing_attribute_is_invalid_argument() {
        let root = TempDir::new().unwrap();
        let dir = fake_function(root.path(), "0000:b1:00.0", ["0x8086", "0xbcce", "0x8086", "0x0"]);
        fs::remove_file(dir.join("subsystem_device")).unwrap();

        let dev = SysfsDevice::open(&config_for(&root), "0000:b1:00.0").unwrap();
        let err = dev.identity().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
    }

    #[test]
    fn probes_dfl_features() {
        let root = TempDir::new().unwrap();
        let dir = fake_function(root.path(), "0000:b1:00.0", ["0x8086", "0xaf00", "0x8086", "0x0"]);
        add_feature(&dir, "dfl-fme.0", 0, "0x9");
        add_feature(&dir, "dfl-fme.0", 3, "0x12");

        let dev = SysfsDevice::open(&config_for(&root), "0000:b1:00.0").unwrap();
        assert!(dev.has_feature(0x12).unwrap());
        assert!(!dev.has_feature(0x0e).unwrap());
    }

    #[test]
    fn feature_probe_without_region_fails() {
        let root = TempDir::new().unwrap();
        fake_function(root.path(), "0000:b1:00.0", ["0x8086", "0xaf00", "0x8086", "0x0"]);

        let dev = SysfsDevice::open(&config_for(&root), "0000:b1:00.0").unwrap();
        assert!(dev.has_feature(0x12).is_err());
    }

    #[test]
    fn discovers_known_boards_in_address_order() {
        let root = TempDir::new().unwrap();
        fake_function(root.path(), "0000:d8:00.0", ["0x8086", "0x0b30", "0x8086", "0x0"]);
        fake_function(root.path(), "0000:3b:00.0", ["0x1c2c", "0x1000", "0x1c2c", "0x0"]);
        // unrelated NIC
        fake_function(root.path(), "0000:00:1f.6", ["0x8086", "0x15bc", "0x8086", "0x0"]);
        // unknown IDs but a DFL region
        let dfl = fake_function(root.path(), "0000:af:00.0", ["0x8086", "0xabcd", "0x8086", "0x0"]);
        add_feature(&dfl, "dfl-fme.1", 0, "0x12");

        let mgr = DeviceManager::discover(&config_for(&root)).unwrap();
        let addrs: Vec<_> = mgr.devices().iter().map(SysfsDevice::pcie_address).collect();
        assert_eq!(addrs, ["0000:3b:00.0", "0000:af:00.0", "0000:d8:00.0"]);
        assert!(mgr.find("0000:af:00.0").is_ok());
        assert!(mgr.find("0000:00:1f.6").is_err());
    }

    #[test]
    fn oversized_ids_are_not_truncated() {
        let root = TempDir::new().unwrap();
        // would alias to 8086:0b30 if cut to 16 bits
        fake_function(root.path(), "0000:3b:00.0", ["0x18086", "0x0b30", "0x8086", "0x0"]);
        fake_function(root.path(), "0000:d8:00.0", ["0x8086", "0x0b30", "0x8086", "0x0"]);

        let mgr = DeviceManager::discover(&config_for(&root)).unwrap();
        assert_eq!(mgr.device_count(), 1);
        assert_eq!(mgr.devices()[0].pcie_address(), "0000:d8:00.0");
    }

    #[test]
    fn discovery_without_boards_fails() {
        let root = TempDir::new().unwrap();
        fake_function(root.path(), "0000:00:1f.6", ["0x8086", "0x15bc", "0x8086", "0x0"]);

        let err = DeviceManager::discover(&config_for(&root)).unwrap_err();
        assert!(matches!(err, BoardError::NoDevicesFound));
    }

    #[test]
    #[ignore] // Requires FPGA hardware
    fn test_device_discovery() {
        match DeviceManager::discover(&BoardConfig::default()) {
            Ok(manager) => {
                println!("Found {} board(s)", manager.device_count());
                for device in manager.devices() {
                    println!("  {}: {:?}", device.pcie_address(), device.identity());
                }
            }
            Err(BoardError::NoDevicesFound) => println!("No boards found (hardware required)"),
            Err(e) => eprintln!("Discovery error (expected if no hardware): {e}"),
        }
    }
}
