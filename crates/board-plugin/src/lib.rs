//! Board support module resolution and dispatch for FPGA accelerator cards.
//!
//! Each supported card ships a board module (`libboard_*.so`) that knows how
//! to print its MAC, PHY, security, boot and event-log reports. This crate
//! maps a device to the right module, loads it once per process and calls
//! its entry points by name.
//!
//! # Flow
//!
//! ```text
//! SysfsDevice ──identity──▶ BoardResolver ──first match──▶ PlatformEntry
//!                                │                             │
//!                                │ cached slot or DlopenLoader ◀┘
//!                                ▼
//!                          ModuleHandle ──Request──▶ Dispatch::{Completed, Unsupported}
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use board_plugin::{BoardConfig, BoardResolver, DeviceManager, Dispatch, Request};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BoardConfig::from_env();
//! let resolver = BoardResolver::from_config(&config);
//!
//! for dev in DeviceManager::discover(&config)?.devices() {
//!     println!("{}", resolver.product_name(dev)?);
//!     if resolver.dispatch(dev, &Request::MacInfo)? == Dispatch::Unsupported {
//!         println!("mac info is not supported");
//!     }
//! }
//!
//! resolver.unload_all()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod config;
mod discovery;
pub mod dispatch;
mod error;
mod identity;
pub mod loader;
mod resolver;

/// Board identification constants (re-exported from board-ids).
pub mod pcie_ids {
    pub use board_ids::pcie::{
        device_id, feature_id, lspci_filter, subsystem_id, INTEL_VENDOR_ID, SILICOM_VENDOR_ID,
    };
    pub use board_ids::{PlatformEntry, FALLBACK_PRODUCT_NAME, PLATFORM_TABLE};
}

pub use config::{BoardConfig, DEFAULT_MODULE_SEARCH_PATHS, MODULE_PATH_ENV, SYSFS_ROOT_ENV};
pub use discovery::{DeviceManager, SysfsDevice};
pub use dispatch::{Dispatch, EventLogFilter, Request};
pub use error::{BoardError, ErrorKind, Result};
pub use identity::{BoardDevice, DeviceIdentity};
pub use loader::{BoardModule, DlopenLoader, ModuleLoader};
pub use resolver::{BoardResolver, ModuleHandle};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        BoardConfig, BoardDevice, BoardError, BoardResolver, DeviceManager, Dispatch,
        EventLogFilter, ModuleHandle, Request, Result, SysfsDevice,
    };
}
