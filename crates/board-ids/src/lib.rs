//! Identity model for FPGA accelerator boards.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure description of the boards the management tools know about: PCI
//! vendor/device IDs, DFL feature IDs used to tell boards apart, and the
//! ordered platform table mapping an identity to its board support module.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pcie`] | Vendor, device and DFL feature IDs |
//! | [`platform`] | Ordered platform table, first match wins |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod pcie;
pub mod platform;

pub use platform::{PlatformEntry, FALLBACK_PRODUCT_NAME, PLATFORM_TABLE};
