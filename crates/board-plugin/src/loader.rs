//! Board module loading
//!
//! A board module is a shared library exporting zero or more C-ABI report
//! entry points. [`DlopenLoader`] tries each configured search prefix in
//! order and returns the first library that opens. It does no caching;
//! [`crate::BoardResolver`] owns one handle slot per platform entry.

use crate::config::BoardConfig;
use crate::error::{BoardError, Result};
use libloading::os::unix::{Library, RTLD_LAZY, RTLD_LOCAL};
use parking_lot::Mutex;
use std::ffi::c_char;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `int entry(const char *token)`
pub type ReportFn = unsafe extern "C" fn(token: *const c_char) -> i32;

/// `int fpga_event_log(const char *token, uint32_t first, uint32_t last,
/// bool print_list, bool print_sensors, bool print_bits)`
pub type EventLogFn = unsafe extern "C" fn(
    token: *const c_char,
    first: u32,
    last: u32,
    print_list: bool,
    print_sensors: bool,
    print_bits: bool,
) -> i32;

/// A loaded board support module
///
/// Entry point lookups return `None` when the module does not export the
/// symbol. Returned function pointers are only valid while the module stays
/// open; the resolver serializes dispatch and [`BoardModule::close`].
pub trait BoardModule: Debug + Send + Sync {
    /// Module file name as listed in the platform table
    fn name(&self) -> &str;

    /// Look up a report entry point
    fn report_fn(&self, symbol: &str) -> Option<ReportFn>;

    /// Look up the event log entry point
    fn event_log_fn(&self, symbol: &str) -> Option<EventLogFn>;

    /// Whether entry points can still be looked up
    fn is_open(&self) -> bool;

    /// Release the module
    ///
    /// The module is closed afterwards even when this fails: entry points
    /// are gone and a second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::UnloadFailed` if the platform loader refuses.
    fn close(&self) -> Result<()>;
}

/// Strategy for turning a module file name into a loaded module
pub trait ModuleLoader: Send + Sync {
    /// Load `filename`
    ///
    /// # Errors
    ///
    /// Returns `BoardError::ModuleNotFound` carrying the last loader
    /// diagnostic if no search path yields a loadable module.
    fn load(&self, filename: &str) -> Result<Arc<dyn BoardModule>>;
}

/// Loads modules with `dlopen(RTLD_LAZY | RTLD_LOCAL)`
///
/// Lazy binding lets modules with unresolved optional symbols load; local
/// binding keeps their symbols out of the global namespace.
#[derive(Debug, Clone)]
pub struct DlopenLoader {
    search_paths: Vec<PathBuf>,
}

impl DlopenLoader {
    /// Loader over explicit search prefixes, tried in order
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Loader over the configured search prefixes
    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(config.search_paths.clone())
    }

    /// Search prefixes
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for DlopenLoader {
    fn default() -> Self {
        Self::from_config(&BoardConfig::default())
    }
}

impl ModuleLoader for DlopenLoader {
    fn load(&self, filename: &str) -> Result<Arc<dyn BoardModule>> {
        let mut diagnostic = String::from("no search paths configured");

        for prefix in &self.search_paths {
            let candidate = prefix.join(filename);
            tracing::debug!("Trying {}", candidate.display());

            // SAFETY: loading runs the module's initializers. Board modules
            // are trusted system libraries installed alongside this tool.
            let opened = unsafe { Library::open(Some(&candidate), RTLD_LAZY | RTLD_LOCAL) };

            match opened {
                Ok(library) => {
                    tracing::info!("Loaded board module {}", candidate.display());
                    return Ok(Arc::new(DlopenModule::new(filename, candidate, library)));
                }
                Err(e) => diagnostic = e.to_string(),
            }
        }

        Err(BoardError::module_not_found(filename, diagnostic))
    }
}

/// Module opened by [`DlopenLoader`]
#[derive(Debug)]
pub struct DlopenModule {
    name: String,
    path: PathBuf,
    library: Mutex<Option<Library>>,
}

impl DlopenModule {
    fn new(name: &str, path: PathBuf, library: Library) -> Self {
        Self {
            name: name.to_string(),
            path,
            library: Mutex::new(Some(library)),
        }
    }

    /// Path the module was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lookup<T: Copy>(&self, symbol: &str) -> Option<T> {
        let guard = self.library.lock();
        let library = guard.as_ref()?;

        // SAFETY: the caller picks `T` to match the documented entry point
        // ABI for `symbol`.
        match unsafe { library.get::<T>(symbol.as_bytes()) } {
            Ok(sym) => Some(*sym),
            Err(e) => {
                tracing::debug!("No {symbol} entry point in {}: {e}", self.name);
                None
            }
        }
    }
}

impl BoardModule for DlopenModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn report_fn(&self, symbol: &str) -> Option<ReportFn> {
        self.lookup::<ReportFn>(symbol)
    }

    fn event_log_fn(&self, symbol: &str) -> Option<EventLogFn> {
        self.lookup::<EventLogFn>(symbol)
    }

    fn is_open(&self) -> bool {
        self.library.lock().is_some()
    }

    fn close(&self) -> Result<()> {
        // libloading consumes the handle whether or not dlclose succeeds
        let Some(library) = self.library.lock().take() else {
            return Ok(());
        };
        library
            .close()
            .map_err(|e| BoardError::unload_failed(&self.name, e.to_string()))?;
        tracing::info!("Unloaded board module {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_module_reports_last_diagnostic() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let loader = DlopenLoader::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);

        let err = loader.load("libboard_missing.so").unwrap_err();
        match err {
            BoardError::ModuleNotFound { module, diagnostic } => {
                assert_eq!(module, "libboard_missing.so");
                assert!(diagnostic.contains("libboard_missing.so"), "{diagnostic}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_file_is_not_loadable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("libboard_bogus.so"), b"not an ELF").unwrap();
        let loader = DlopenLoader::new(vec![dir.path().to_path_buf()]);

        assert!(matches!(
            loader.load("libboard_bogus.so"),
            Err(BoardError::ModuleNotFound { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn loads_system_library_after_missing_prefix() {
        let empty = TempDir::new().unwrap();
        let loader = DlopenLoader::new(vec![empty.path().to_path_buf(), PathBuf::new()]);

        let module = loader.load("libc.so.6").unwrap();
        assert_eq!(module.name(), "libc.so.6");
        assert!(module.is_open());

        // present symbol resolves, absent one reads as unsupported
        assert!(module.report_fn("getpid").is_some());
        assert!(module.report_fn("print_mac_info").is_none());
        assert!(module.event_log_fn("fpga_event_log").is_none());

        module.close().unwrap();
        assert!(!module.is_open());
        assert!(module.report_fn("getpid").is_none());
        module.close().unwrap();
    }

    #[test]
    fn empty_search_list() {
        let loader = DlopenLoader::new(Vec::new());
        let err = loader.load("libboard_n6000.so").unwrap_err();
        assert!(err.to_string().contains("no search paths configured"));
    }
}
