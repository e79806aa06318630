pub mod error;
pub mod host;
pub mod hot_reload;
pub mod input;

pub use error::{HarnessError, HarnessResult};
pub use host::HostState;
pub use hot_reload::{
    AssetReloadCoordinator, AssetStore, DirectoryChangeWatcher, FileAssetStore, GameModule,
    GameState, HotReloadConfig, ModuleLoader, ReloadOrchestrator, ReloadStats,
};
pub use input::{HotkeyInput, Hotkeys, InputState, KeyCode};
