//! Runtime configuration
//!
//! Module search paths and the sysfs root, with environment overrides.

use std::path::PathBuf;

/// Colon-separated directories searched before the defaults.
pub const MODULE_PATH_ENV: &str = "BOARD_MODULE_PATH";

/// Alternate sysfs mount point (tests, containers).
pub const SYSFS_ROOT_ENV: &str = "BOARD_SYSFS_ROOT";

/// Default module search prefixes, in priority order.
///
/// The empty prefix hands the bare file name to the dynamic loader, which
/// then applies its own search rules (`LD_LIBRARY_PATH`, `ld.so.cache`).
pub const DEFAULT_MODULE_SEARCH_PATHS: &[&str] = &[
    "",
    "/usr/lib64/opae/",
    "/usr/lib/opae/",
    "/usr/local/lib64/opae/",
    "/usr/local/lib/opae/",
];

/// Default sysfs mount point.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Board plugin configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Directory prefixes tried in order when loading a module
    pub search_paths: Vec<PathBuf>,

    /// Root of the sysfs tree used for device discovery
    pub sysfs_root: PathBuf,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            search_paths: DEFAULT_MODULE_SEARCH_PATHS
                .iter()
                .map(PathBuf::from)
                .collect(),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
        }
    }
}

impl BoardConfig {
    /// Build configuration from the environment
    ///
    /// Entries of `BOARD_MODULE_PATH` take priority over the defaults;
    /// `BOARD_SYSFS_ROOT` replaces `/sys`.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(MODULE_PATH_ENV).ok().as_deref(),
            std::env::var(SYSFS_ROOT_ENV).ok().as_deref(),
        )
    }

    fn from_vars(module_path: Option<&str>, sysfs_root: Option<&str>) -> Self {
        let mut config = Self::default();

        if let Some(paths) = module_path {
            let custom: Vec<PathBuf> = paths
                .split(':')
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
            tracing::debug!("{MODULE_PATH_ENV} adds {} search path(s)", custom.len());
            config.prepend_search_paths(custom);
        }

        if let Some(root) = sysfs_root.filter(|r| !r.is_empty()) {
            config.sysfs_root = PathBuf::from(root);
        }

        config
    }

    /// Put `paths` ahead of the existing search paths, dropping duplicates
    pub fn prepend_search_paths(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut merged: Vec<PathBuf> = Vec::new();
        for path in paths.into_iter().chain(self.search_paths.drain(..)) {
            if !merged.contains(&path) {
                merged.push(path);
            }
        }
        self.search_paths = merged;
    }

    /// `<sysfs_root>/bus/pci/devices`
    pub fn pci_devices_dir(&self) -> PathBuf {
        self.sysfs_root.join("bus/pci/devices")
    }
}
