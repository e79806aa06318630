use std::ffi::c_void;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use super::error::{function_not_found, io_error};
use crate::error::{HarnessError, HarnessResult};

/// Exported name of the module's init entry point
pub const INIT_SYMBOL: &str = "initWrapper";

/// Exported name of the module's per-frame entry point
pub const UPDATE_SYMBOL: &str = "updateWrapper";

/// `initWrapper(state, is_reload) -> status`
pub type InitFn = unsafe extern "C" fn(*mut c_void, bool) -> i32;

/// `updateWrapper(state) -> status`
pub type UpdateFn = unsafe extern "C" fn(*mut c_void) -> i32;

/// The two entry points every swappable module provides.
///
/// A zero status means success; anything else is a failure the caller reports.
pub trait GameModule<S> {
    fn init(&self, state: &mut S, is_reload: bool) -> i32;

    fn update(&self, state: &mut S) -> i32;
}

/// Produces a fresh module instance each time the loader opens.
pub trait ModuleBackend<S> {
    type Module: GameModule<S>;

    fn open(&mut self) -> HarnessResult<Self::Module>;
}

/// Module resolved from a dynamic library.
///
/// The function pointers are only valid while `_library` is alive, which is why
/// they never leave this struct.
pub struct DylibModule {
    init_fn: InitFn,
    update_fn: UpdateFn,
    path: PathBuf,
    _library: Library,
}

impl DylibModule {
    /// Path of the working copy this module was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<S> GameModule<S> for DylibModule {
    fn init(&self, state: &mut S, is_reload: bool) -> i32 {
        // SAFETY: the module is built against the same state layout as the host.
        unsafe { (self.init_fn)(state as *mut S as *mut c_void, is_reload) }
    }

    fn update(&self, state: &mut S) -> i32 {
        // SAFETY: see `init`.
        unsafe { (self.update_fn)(state as *mut S as *mut c_void) }
    }
}

/// Opens the module artifact through a working copy on disk.
///
/// The build writes `module_path`; we only ever load `working_copy_path`, so a
/// rebuild never has to overwrite a file the process has mapped.
#[derive(Debug, Clone)]
pub struct DylibBackend {
    module_path: PathBuf,
    working_copy_path: PathBuf,
}

impl DylibBackend {
    pub fn new(module_path: impl AsRef<Path>, working_copy_suffix: &str) -> Self {
        let module_path = module_path.as_ref().to_path_buf();
        let working_copy_path = working_copy_path(&module_path, working_copy_suffix);
        Self {
            module_path,
            working_copy_path,
        }
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn working_copy_path(&self) -> &Path {
        &self.working_copy_path
    }

    /// Directory the build drops the artifact into
    pub fn watch_dir(&self) -> PathBuf {
        match self.module_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn refresh_working_copy(&self) -> HarnessResult<()> {
        // Copy next to the target and rename over it, so a stale mapping of the
        // previous working copy keeps its own inode.
        let staging = self.working_copy_path.with_extension("staging");
        fs::copy(&self.module_path, &staging).map_err(|e| io_error(&self.module_path, e))?;
        fs::rename(&staging, &self.working_copy_path)
            .map_err(|e| io_error(&self.working_copy_path, e))?;
        Ok(())
    }
}

impl<S> ModuleBackend<S> for DylibBackend {
    type Module = DylibModule;

    fn open(&mut self) -> HarnessResult<DylibModule> {
        self.refresh_working_copy()?;

        let path = self.working_copy_path.clone();
        let library = unsafe { Library::new(&path) }.map_err(|e| HarnessError::LibraryLoad {
            path: path.clone(),
            error: e.to_string(),
        })?;

        let (init_fn, update_fn) = unsafe {
            let init: Symbol<InitFn> = library
                .get(INIT_SYMBOL.as_bytes())
                .map_err(|e| function_not_found(&path, INIT_SYMBOL, e))?;
            let update: Symbol<UpdateFn> = library
                .get(UPDATE_SYMBOL.as_bytes())
                .map_err(|e| function_not_found(&path, UPDATE_SYMBOL, e))?;
            (*init, *update)
        };

        Ok(DylibModule {
            init_fn,
            update_fn,
            path,
            _library: library,
        })
    }
}

/// `game.so` + `_live` -> `game_live.so`
pub fn working_copy_path(module_path: &Path, suffix: &str) -> PathBuf {
    let stem = module_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match module_path.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    module_path.with_file_name(file_name)
}

/// Loader lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Closed,
    Open,
}

/// Owns the one live module and guards its open/close lifecycle.
pub struct ModuleLoader<S, B: ModuleBackend<S>> {
    backend: B,
    module: Option<B::Module>,
    generation: u64,
    _state: PhantomData<fn(&mut S)>,
}

impl<S, B: ModuleBackend<S>> ModuleLoader<S, B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            module: None,
            generation: 0,
            _state: PhantomData,
        }
    }

    pub fn state(&self) -> LoaderState {
        if self.module.is_some() {
            LoaderState::Open
        } else {
            LoaderState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.module.is_some()
    }

    /// Number of successful opens so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn open(&mut self) -> HarnessResult<()> {
        if self.module.is_some() {
            return Err(HarnessError::ModuleAlreadyLoaded);
        }

        let module = self.backend.open()?;
        self.module = Some(module);
        self.generation += 1;
        log::info!("[ModuleLoader::open] Module generation {} loaded", self.generation);
        Ok(())
    }

    pub fn close(&mut self) -> HarnessResult<()> {
        match self.module.take() {
            Some(module) => {
                drop(module);
                log::debug!("[ModuleLoader::close] Module generation {} released", self.generation);
                Ok(())
            }
            None => Err(HarnessError::ModuleNotLoaded),
        }
    }

    /// Close then open. On a failed open the loader stays closed.
    pub fn reload(&mut self) -> HarnessResult<()> {
        if self.module.is_some() {
            self.close()?;
        }
        self.open()
    }

    pub fn init(&self, state: &mut S, is_reload: bool) -> HarnessResult<()> {
        let module = self.module.as_ref().ok_or(HarnessError::ModuleNotLoaded)?;
        match module.init(state, is_reload) {
            0 => Ok(()),
            code => Err(HarnessError::InitializationError { code }),
        }
    }

    pub fn update(&self, state: &mut S) -> HarnessResult<()> {
        let module = self.module.as_ref().ok_or(HarnessError::ModuleNotLoaded)?;
        match module.update(state) {
            0 => Ok(()),
            code => Err(HarnessError::UpdateError { code }),
        }
    }
}
