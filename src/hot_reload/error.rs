//! Hot reload error helpers
//!
//! Constructors and context helpers so the reload code can propagate failures
//! with `?` instead of unwrapping.

use std::path::Path;

use crate::error::{HarnessError, HarnessResult};

/// Helper trait for naming the resource behind a poisoned lock
pub trait HotReloadErrorContext<T> {
    fn hot_reload_context(self, context: &str) -> HarnessResult<T>
    where
        Self: Sized;
}

impl<T, E> HotReloadErrorContext<T> for Result<T, E>
where
    E: Into<HarnessError>,
{
    fn hot_reload_context(self, context: &str) -> HarnessResult<T> {
        self.map_err(|e| {
            let base_error: HarnessError = e.into();
            match base_error {
                HarnessError::LockPoisoned { .. } => HarnessError::LockPoisoned {
                    resource: format!("hot_reload::{}", context),
                },
                other => other,
            }
        })
    }
}

/// Create an IO error tied to a path
pub fn io_error(path: impl AsRef<Path>, error: impl std::fmt::Display) -> HarnessError {
    HarnessError::Io {
        path: path.as_ref().to_path_buf(),
        error: error.to_string(),
    }
}

/// Create a watcher error
pub fn watcher_error(path: impl AsRef<Path>, error: impl std::fmt::Display) -> HarnessError {
    HarnessError::WatcherError {
        path: path.as_ref().to_path_buf(),
        error: error.to_string(),
    }
}

/// Create a missing entry point error
pub fn function_not_found(
    path: impl AsRef<Path>,
    symbol: &str,
    error: impl std::fmt::Display,
) -> HarnessError {
    HarnessError::FunctionNotFound {
        path: path.as_ref().to_path_buf(),
        symbol: symbol.to_string(),
        error: error.to_string(),
    }
}

/// Create a configuration error
pub fn config_error(message: impl Into<String>) -> HarnessError {
    HarnessError::Config {
        message: message.into(),
    }
}
