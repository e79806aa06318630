/// Hot-Reload System
///
/// Keeps the host process running while the game module and its assets are
/// rebuilt on disk, swapping the new versions in between frames.
///
/// Key pieces:
/// - One-shot directory watchers that raise a flag on any change
/// - Module loader that loads a working copy of the module artifact
/// - Bounded retry around asset reinitialisation
/// - Per-frame orchestrator tying the three together

pub mod asset_reload;
pub mod error;
pub mod module_loader;
pub mod orchestrator;
pub mod watcher;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use asset_reload::{
    AssetReloadCoordinator, AssetStore, AssetSummary, Backoff, FileAssetStore, FixedDelay, NoDelay,
    RetryPolicy,
};
pub use module_loader::{
    DylibBackend, DylibModule, GameModule, LoaderState, ModuleBackend, ModuleLoader, INIT_SYMBOL,
    UPDATE_SYMBOL,
};
pub use orchestrator::{GameState, ReloadOrchestrator, ReloadStats};
pub use watcher::{DirectoryChangeWatcher, WatchFlag, WatchHandle, WatchSpawner, WatchState};

use self::error::{config_error, io_error};
use crate::error::HarnessResult;
use crate::input::Hotkeys;

/// Asset retry settings as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRetryConfig {
    /// Reinitialisation attempts before giving up
    pub attempts: u32,

    /// Delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl Default for AssetRetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            delay_ms: policy.delay.as_millis() as u64,
        }
    }
}

impl AssetRetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

/// Hot-reload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotReloadConfig {
    /// Module artifact written by the build
    pub module_path: PathBuf,

    /// Appended to the artifact's file stem to name the copy we actually load
    pub working_copy_suffix: String,

    /// Directory holding the game's assets
    pub asset_dir: PathBuf,

    /// Retry policy for asset reloads
    pub asset_retry: AssetRetryConfig,

    /// Reload / restart key bindings
    pub hotkeys: Hotkeys,

    /// Target frames per second of the host loop
    pub frame_rate: u32,

    /// Call `init(state, true)` after each module reload
    pub init_after_reload: bool,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            module_path: PathBuf::from("target/debug").join(format!(
                "{}sample_game{}",
                std::env::consts::DLL_PREFIX,
                std::env::consts::DLL_SUFFIX
            )),
            working_copy_suffix: "_live".to_string(),
            asset_dir: PathBuf::from("assets"),
            asset_retry: AssetRetryConfig::default(),
            hotkeys: Hotkeys::default(),
            frame_rate: 60,
            init_after_reload: false,
        }
    }
}

impl HotReloadConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> HarnessResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let config = Self::from_toml_str(&source)?;
        log::info!("Loaded hot-reload config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.module_path.as_os_str().is_empty() {
            return Err(config_error("module_path must not be empty"));
        }
        if self.asset_dir.as_os_str().is_empty() {
            return Err(config_error("asset_dir must not be empty"));
        }
        if self.working_copy_suffix.is_empty() {
            return Err(config_error(
                "working_copy_suffix must not be empty; the working copy would overwrite the artifact",
            ));
        }
        if self.asset_retry.attempts == 0 {
            return Err(config_error("asset_retry.attempts must be at least 1"));
        }
        if self.frame_rate == 0 {
            return Err(config_error("frame_rate must be at least 1"));
        }
        Ok(())
    }

    /// Time budget of one frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}
