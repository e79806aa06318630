//! Error types for the reload harness
//!
//! Every terminal failure of the reload subsystem is one of these variants and is
//! handed back to the host's frame loop, which decides whether to log or abort.

use std::path::PathBuf;

/// Result alias used throughout the crate
pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A required entry point is missing from the freshly opened module
    #[error("Function not found in module {}: {symbol} ({error})", .path.display())]
    FunctionNotFound {
        path: PathBuf,
        symbol: String,
        error: String,
    },

    /// The working copy could not be opened as a dynamic library
    #[error("Failed to load module {}: {error}", .path.display())]
    LibraryLoad { path: PathBuf, error: String },

    /// Entry point called, or module closed, while no module is open
    #[error("No module is loaded")]
    ModuleNotLoaded,

    /// `open` called while a module is already open
    #[error("A module is already loaded; close it before opening another")]
    ModuleAlreadyLoaded,

    #[error("Module init returned non-zero status {code}")]
    InitializationError { code: i32 },

    #[error("Module update returned non-zero status {code}")]
    UpdateError { code: i32 },

    /// Asset reinitialisation failed on every allowed attempt
    #[error("Asset reload failed after {attempts} attempts: {error}")]
    AssetLoadError { attempts: u32, error: String },

    /// A directory watcher could not be armed, or its backend reported an error
    #[error("Watcher error for {}: {error}", .path.display())]
    WatcherError { path: PathBuf, error: String },

    #[error("IO error at {}: {error}", .path.display())]
    Io { path: PathBuf, error: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Lock poisoned: {resource}")]
    LockPoisoned { resource: String },
}

impl HarnessError {
    /// Whether the error was raised by the module's own entry points rather
    /// than by the harness machinery.
    pub fn is_module_status(&self) -> bool {
        matches!(
            self,
            HarnessError::InitializationError { .. } | HarnessError::UpdateError { .. }
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for HarnessError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        HarnessError::LockPoisoned {
            resource: err.to_string(),
        }
    }
}
