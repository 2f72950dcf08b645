//! Error types for board plugin operations

use crate::identity::DeviceIdentity;
use thiserror::Error;

/// Result type alias for board plugin operations
pub type Result<T> = std::result::Result<T, BoardError>;

/// Coarse classification of a [`BoardError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, unreadable device identity or stale module handle.
    InvalidArgument,
    /// No platform entry or no module file matched.
    NotFound,
    /// A platform entry matched but its module could not be opened.
    PluginLoadFailed,
    /// The module has no entry point for the request.
    Unsupported,
    /// Lock state conflict or an unexpected platform failure.
    Internal,
}

/// Errors that can occur while resolving or dispatching to board modules
#[derive(Debug, Error)]
pub enum BoardError {
    /// Invalid input or unreadable device identity
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Reason for failure
        reason: String,
    },

    /// No platform entry matches the device identity
    #[error("No board module matches {identity}")]
    NoMatchingBoard {
        /// Identity that was looked up
        identity: DeviceIdentity,
    },

    /// No search path yielded a loadable module file
    #[error("Module {module} not found in search paths: {diagnostic}")]
    ModuleNotFound {
        /// Module file name
        module: String,
        /// Last diagnostic reported by the dynamic loader
        diagnostic: String,
    },

    /// A matched module could not be loaded
    #[error("Failed to load \"{module}\": {reason}")]
    PluginLoadFailed {
        /// Module file name
        module: String,
        /// Loader diagnostic
        reason: String,
    },

    /// The module does not export the requested entry point
    #[error("{symbol} is not supported by this board")]
    Unsupported {
        /// Missing symbol name
        symbol: &'static str,
    },

    /// An entry point ran and reported failure
    #[error("{symbol} failed with status {status}")]
    ReportFailed {
        /// Symbol that was invoked
        symbol: &'static str,
        /// Status returned by the module
        status: i32,
    },

    /// No board devices detected on the system
    #[error("No FPGA board devices detected")]
    NoDevicesFound,

    /// Unloading a module failed
    #[error("Failed to unload \"{module}\": {reason}")]
    UnloadFailed {
        /// Module file name
        module: String,
        /// Loader diagnostic
        reason: String,
    },

    /// Internal consistency failure
    #[error("Internal error: {reason}")]
    Internal {
        /// Reason for failure
        reason: String,
    },

    /// I/O error while reading device attributes
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl BoardError {
    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            module: module.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Create a plugin load failure
    pub fn plugin_load_failed(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PluginLoadFailed {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Create an unload failure
    pub fn unload_failed(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnloadFailed {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::Io { .. } => ErrorKind::InvalidArgument,
            Self::NoMatchingBoard { .. } | Self::ModuleNotFound { .. } | Self::NoDevicesFound => {
                ErrorKind::NotFound
            }
            Self::PluginLoadFailed { .. } => ErrorKind::PluginLoadFailed,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::ReportFailed { .. } | Self::UnloadFailed { .. } | Self::Internal { .. } => {
                ErrorKind::Internal
            }
        }
    }
}
