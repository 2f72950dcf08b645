//! Board module resolution
//!
//! [`BoardResolver`] owns the platform table and one module slot per entry.
//! All slot reads and writes, module loads, dispatches and unloads happen
//! under a single reentrant lock:
//!
//! - a module is loaded at most once per entry, however many threads race
//!   to resolve it
//! - `unload_all` never runs while a dispatch is inside a module
//! - nested calls on the same thread (resolve inside dispatch, a module
//!   asking for its product name) re-enter the lock instead of deadlocking
//!
//! Slot state lives in a `RefCell` inside the lock. Borrows are never held
//! across calls into devices, loaders or modules, so re-entry only fails
//! (with `BoardError::Internal`) if a module closes itself re-entrantly
//! during `unload_all`.
//!
//! None of these operations time out. A module whose initializer hangs
//! blocks every other caller of the same resolver.

use crate::config::BoardConfig;
use crate::dispatch::{self, Dispatch, Request};
use crate::error::{BoardError, Result};
use crate::identity::{BoardDevice, DeviceIdentity};
use crate::loader::{BoardModule, DlopenLoader, ModuleLoader};
use board_ids::{PlatformEntry, FALLBACK_PRODUCT_NAME, PLATFORM_TABLE};
use parking_lot::ReentrantMutex;
use std::cell::{Ref, RefCell, RefMut};
use std::sync::Arc;

/// Platform entry plus its lazily populated module slot
#[derive(Debug)]
struct Descriptor {
    entry: PlatformEntry,
    module: Option<Arc<dyn BoardModule>>,
}

/// Shared reference to a module loaded for one platform entry
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    index: usize,
    module: Arc<dyn BoardModule>,
}

impl ModuleHandle {
    /// Module file name
    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// Position of the owning entry in the platform table
    pub const fn descriptor(&self) -> usize {
        self.index
    }

    /// The loaded module
    pub fn module(&self) -> &dyn BoardModule {
        self.module.as_ref()
    }

    /// Whether both handles refer to the same loaded module instance
    pub fn same_module(&self, other: &Self) -> bool {
        same_instance(&self.module, &other.module)
    }
}

/// Resolves devices to board modules and dispatches reports into them
#[derive(Debug)]
pub struct BoardResolver<L: ModuleLoader = DlopenLoader> {
    loader: L,
    table: ReentrantMutex<RefCell<Vec<Descriptor>>>,
}

impl BoardResolver<DlopenLoader> {
    /// Resolver over the built-in platform table, loading with `dlopen`
    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(DlopenLoader::from_config(config))
    }
}

impl<L: ModuleLoader> BoardResolver<L> {
    /// Resolver over the built-in platform table
    pub fn new(loader: L) -> Self {
        Self::with_table(PLATFORM_TABLE.iter().copied(), loader)
    }

    /// Resolver over a caller-supplied table; order is match priority
    pub fn with_table(table: impl IntoIterator<Item = PlatformEntry>, loader: L) -> Self {
        let descriptors = table
            .into_iter()
            .map(|entry| Descriptor {
                entry,
                module: None,
            })
            .collect();

        Self {
            loader,
            table: ReentrantMutex::new(RefCell::new(descriptors)),
        }
    }

    /// The module loader
    pub const fn loader(&self) -> &L {
        &self.loader
    }

    /// Find and, if needed, load the board module for `device`
    ///
    /// Entries are scanned in order. An entry applies when vendor and device
    /// IDs match and, if it names a feature, the device exposes it; a failed
    /// feature probe only disqualifies that entry. The first applicable
    /// entry decides the outcome: its cached module, a fresh load, or a load
    /// failure. Later entries are not tried after a load failure.
    ///
    /// # Errors
    ///
    /// - `BoardError::InvalidArgument` if the identity cannot be read
    /// - `BoardError::NoMatchingBoard` if no entry applies
    /// - `BoardError::PluginLoadFailed` if the matched module cannot be loaded
    pub fn resolve(&self, device: &dyn BoardDevice) -> Result<ModuleHandle> {
        let identity = DeviceIdentity::read(device)?;

        let guard = self.table.lock();

        let candidates: Vec<(usize, Option<u16>)> = borrow(&guard)?
            .iter()
            .enumerate()
            .filter(|(_, d)| d.entry.matches_pci(identity.vendor_id, identity.device_id))
            .map(|(index, d)| (index, d.entry.feature_id))
            .collect();

        for (index, feature) in candidates {
            if let Some(feature) = feature {
                match device.has_feature(feature) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!("{identity}: feature {feature:#x} absent, skipping entry {index}");
                        continue;
                    }
                    Err(e) => {
                        tracing::debug!("{identity}: feature {feature:#x} probe failed ({e}), skipping entry {index}");
                        continue;
                    }
                }
            }

            return self.load_slot(&guard, index);
        }

        tracing::debug!("No board module matches {identity}");
        Err(BoardError::NoMatchingBoard { identity })
    }

    fn load_slot(&self, cell: &RefCell<Vec<Descriptor>>, index: usize) -> Result<ModuleHandle> {
        let module_name = {
            let table = borrow(cell)?;
            let descriptor = &table[index];
            if let Some(module) = &descriptor.module {
                return Ok(ModuleHandle {
                    index,
                    module: Arc::clone(module),
                });
            }
            descriptor.entry.module
        };

        let module = self.loader.load(module_name).map_err(|e| {
            tracing::error!("Failed to load \"{module_name}\": {e}");
            match e {
                BoardError::ModuleNotFound { diagnostic, .. } => {
                    BoardError::plugin_load_failed(module_name, diagnostic)
                }
                other => BoardError::plugin_load_failed(module_name, other.to_string()),
            }
        })?;

        borrow_mut(cell)?[index].module = Some(Arc::clone(&module));

        Ok(ModuleHandle { index, module })
    }

    /// Product name for `device`
    ///
    /// Exact four-key match without feature gating; never loads a module.
    /// Falls back to [`FALLBACK_PRODUCT_NAME`].
    ///
    /// # Errors
    ///
    /// Returns `BoardError::InvalidArgument` if the identity cannot be read.
    pub fn product_name(&self, device: &dyn BoardDevice) -> Result<&'static str> {
        let id = DeviceIdentity::read(device)?;

        let guard = self.table.lock();
        let table = borrow(&guard)?;

        Ok(table
            .iter()
            .find(|d| {
                d.entry.matches_exact(
                    id.vendor_id,
                    id.device_id,
                    id.subsystem_vendor_id,
                    id.subsystem_device_id,
                )
            })
            .map_or(FALLBACK_PRODUCT_NAME, |d| d.entry.product_name))
    }

    /// Run `request` in the module behind `handle`
    ///
    /// # Errors
    ///
    /// Returns `BoardError::InvalidArgument` if `handle` was invalidated by
    /// [`Self::unload_all`], or `BoardError::Internal` if its module was
    /// closed behind the resolver's back. A missing entry point is
    /// `Ok(Dispatch::Unsupported)`.
    pub fn invoke(
        &self,
        handle: &ModuleHandle,
        device: &dyn BoardDevice,
        request: &Request,
    ) -> Result<Dispatch> {
        let guard = self.table.lock();

        let live = borrow(&guard)?
            .get(handle.index)
            .and_then(|d| d.module.as_ref())
            .is_some_and(|m| same_instance(m, &handle.module));

        if !live {
            return Err(BoardError::invalid_argument(format!(
                "Module handle for {} is no longer loaded",
                handle.name()
            )));
        }

        if !handle.module.is_open() {
            return Err(BoardError::internal(format!(
                "Board module {} was closed outside unload_all",
                handle.name()
            )));
        }

        Ok(dispatch::call(handle.module(), device.token(), request))
    }

    /// Resolve `device` and run `request`, atomically with respect to unloads
    ///
    /// # Errors
    ///
    /// Any error from [`Self::resolve`] or [`Self::invoke`].
    pub fn dispatch(&self, device: &dyn BoardDevice, request: &Request) -> Result<Dispatch> {
        let _guard = self.table.lock();
        let handle = self.resolve(device)?;
        self.invoke(&handle, device, request)
    }

    /// Unload every loaded module
    ///
    /// Best effort: every populated slot is attempted and cleared. A module
    /// whose close failed is still unusable, so its slot is cleared too and
    /// the next resolution loads it afresh. Outstanding handles become
    /// invalid for [`Self::invoke`].
    ///
    /// # Errors
    ///
    /// Returns the first unload failure.
    pub fn unload_all(&self) -> Result<()> {
        let guard = self.table.lock();
        let mut table = borrow_mut(&guard)?;

        let mut first_error = None;
        for descriptor in table.iter_mut() {
            let Some(module) = descriptor.module.take() else {
                continue;
            };

            if let Err(e) = module.close() {
                tracing::error!("{e}");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Number of populated module slots
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Internal` if called re-entrantly during `unload_all`.
    pub fn loaded_count(&self) -> Result<usize> {
        let guard = self.table.lock();
        let count = borrow(&guard)?
            .iter()
            .filter(|d| d.module.is_some())
            .count();
        Ok(count)
    }
}

fn same_instance(a: &Arc<dyn BoardModule>, b: &Arc<dyn BoardModule>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

fn borrow(cell: &RefCell<Vec<Descriptor>>) -> Result<Ref<'_, Vec<Descriptor>>> {
    cell.try_borrow()
        .map_err(|e| BoardError::internal(format!("Board table busy: {e}")))
}

fn borrow_mut(cell: &RefCell<Vec<Descriptor>>) -> Result<RefMut<'_, Vec<Descriptor>>> {
    cell.try_borrow_mut()
        .map_err(|e| BoardError::internal(format!("Board table busy: {e}")))
}
