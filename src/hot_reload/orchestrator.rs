//! Per-frame reload driver
//!
//! Polls the two change flags, performs module and asset reloads in a fixed
//! order, re-arms the watchers and always finishes the frame with the module's
//! update entry point.

use std::path::{Path, PathBuf};

use super::asset_reload::{AssetReloadCoordinator, AssetStore, AssetSummary, Backoff, FixedDelay};
use super::module_loader::{DylibBackend, ModuleBackend, ModuleLoader};
use super::watcher::{DirectoryChangeWatcher, WatchFlag, WatchHandle, WatchSpawner, WatchState};
use super::HotReloadConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::input::{HotkeyInput, Hotkeys};

/// Application state that survives module reloads
pub trait GameState: Default {
    /// Release anything held before the state is replaced on restart
    fn shutdown(&mut self) {}

    /// Latest view of the asset store, handed over before every `init` and
    /// `update` call
    fn sync_assets(&mut self, _assets: AssetSummary) {}
}

/// Running totals, mostly for logging
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReloadStats {
    pub frames: u64,
    pub module_reloads: u64,
    pub asset_reloads: u64,
    pub restarts: u64,
}

/// One watched resource: its directory, flag and current watcher
struct WatchSlot {
    dir: PathBuf,
    flag: WatchFlag,
    handle: Option<WatchHandle>,
}

impl WatchSlot {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            flag: WatchFlag::new(),
            handle: None,
        }
    }

    /// Replace any previous watcher with a freshly armed one
    fn rearm<W: WatchSpawner>(&mut self, spawner: &W) -> HarnessResult<()> {
        if let Some(previous) = self.handle.take() {
            previous.cancel();
        }
        // Arm before spawning; the new watcher may fire immediately.
        self.flag.arm()?;
        self.handle = Some(spawner.spawn(&self.dir, self.flag.clone())?);
        Ok(())
    }

    fn check_failure(&self) -> HarnessResult<()> {
        if self.flag.state() == WatchState::Failed {
            let error = self
                .flag
                .failure()?
                .unwrap_or_else(|| "watcher failed".to_string());
            return Err(HarnessError::WatcherError {
                path: self.dir.clone(),
                error,
            });
        }
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }
}

pub struct ReloadOrchestrator<S, B, W = DirectoryChangeWatcher, D = FixedDelay>
where
    S: GameState,
    B: ModuleBackend<S>,
    W: WatchSpawner,
    D: Backoff,
{
    loader: ModuleLoader<S, B>,
    assets: AssetReloadCoordinator<D>,
    spawner: W,
    module: WatchSlot,
    asset: WatchSlot,
    hotkeys: Hotkeys,
    init_after_reload: bool,
    stats: ReloadStats,
}

impl<S: GameState> ReloadOrchestrator<S, DylibBackend, DirectoryChangeWatcher, FixedDelay> {
    /// Orchestrator over the real dynamic library and OS watchers
    pub fn from_config(config: &HotReloadConfig) -> Self {
        let backend = DylibBackend::new(&config.module_path, &config.working_copy_suffix);
        let module_dir = backend.watch_dir();
        ReloadOrchestrator::new(
            ModuleLoader::new(backend),
            AssetReloadCoordinator::new(config.asset_retry.policy()),
            DirectoryChangeWatcher::new(),
            module_dir,
            &config.asset_dir,
        )
        .with_hotkeys(config.hotkeys)
        .with_init_after_reload(config.init_after_reload)
    }
}

impl<S, B, W, D> ReloadOrchestrator<S, B, W, D>
where
    S: GameState,
    B: ModuleBackend<S>,
    W: WatchSpawner,
    D: Backoff,
{
    pub fn new(
        loader: ModuleLoader<S, B>,
        assets: AssetReloadCoordinator<D>,
        spawner: W,
        module_dir: impl AsRef<Path>,
        asset_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            loader,
            assets,
            spawner,
            module: WatchSlot::new(module_dir.as_ref().to_path_buf()),
            asset: WatchSlot::new(asset_dir.as_ref().to_path_buf()),
            hotkeys: Hotkeys::unbound(),
            init_after_reload: false,
            stats: ReloadStats::default(),
        }
    }

    pub fn with_hotkeys(mut self, hotkeys: Hotkeys) -> Self {
        self.hotkeys = hotkeys;
        self
    }

    /// Also call `init(state, true)` after every successful module reload
    pub fn with_init_after_reload(mut self, enabled: bool) -> Self {
        self.init_after_reload = enabled;
        self
    }

    pub fn set_init_after_reload(&mut self, enabled: bool) {
        self.init_after_reload = enabled;
    }

    pub fn loader(&self) -> &ModuleLoader<S, B> {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut ModuleLoader<S, B> {
        &mut self.loader
    }

    pub fn spawner(&self) -> &W {
        &self.spawner
    }

    pub fn stats(&self) -> ReloadStats {
        self.stats
    }

    pub fn hotkeys(&self) -> Hotkeys {
        self.hotkeys
    }

    pub fn module_flag(&self) -> &WatchFlag {
        &self.module.flag
    }

    pub fn asset_flag(&self) -> &WatchFlag {
        &self.asset.flag
    }

    /// Initial load: open the module, load assets, run `init(state, false)` and
    /// arm both watchers.
    pub fn start<A: AssetStore + ?Sized>(&mut self, state: &mut S, assets: &mut A) -> HarnessResult<()> {
        self.loader.open()?;
        self.assets.load(assets)?;
        state.sync_assets(assets.summary());
        self.loader.init(state, false)?;

        self.module.rearm(&self.spawner)?;
        self.asset.rearm(&self.spawner)?;

        log::info!(
            "[ReloadOrchestrator::start] Watching {} (module) and {} (assets)",
            self.module.dir.display(),
            self.asset.dir.display()
        );
        Ok(())
    }

    /// Run one frame. Any error is fatal for the frame and is returned as-is.
    pub fn tick<A: AssetStore + ?Sized>(
        &mut self,
        state: &mut S,
        assets: &mut A,
        input: &dyn HotkeyInput,
    ) -> HarnessResult<()> {
        self.stats.frames += 1;

        self.module.check_failure()?;
        self.asset.check_failure()?;

        if self.hotkeys.reload_pressed(input) {
            log::info!("[ReloadOrchestrator::tick] Reload requested from keyboard");
            self.module.flag.fire();
        }

        if self.module.flag.is_fired() {
            self.reload_module(state)?;
        }

        if self.asset.flag.is_fired() {
            self.assets.reload(assets)?;
            self.stats.asset_reloads += 1;
            log::info!("[ReloadOrchestrator::tick] Assets reloaded");
            self.asset.rearm(&self.spawner)?;
        }

        if self.hotkeys.restart_pressed(input) {
            log::info!("[ReloadOrchestrator::tick] Restart requested from keyboard");
            self.restart(state, assets)?;
        }

        state.sync_assets(assets.summary());
        self.loader.update(state)
    }

    fn reload_module(&mut self, state: &mut S) -> HarnessResult<()> {
        // The flag stays fired on failure, so the next frame tries again.
        self.loader.reload()?;
        self.stats.module_reloads += 1;
        log::info!(
            "[ReloadOrchestrator::reload_module] Module reloaded (generation {})",
            self.loader.generation()
        );

        if self.init_after_reload {
            self.loader.init(state, true)?;
        }

        self.module.rearm(&self.spawner)
    }

    /// Throw the state away and start it over with the current module.
    pub fn restart<A: AssetStore + ?Sized>(&mut self, state: &mut S, assets: &A) -> HarnessResult<()> {
        state.shutdown();
        *state = S::default();
        state.sync_assets(assets.summary());
        self.stats.restarts += 1;
        self.loader.init(state, false)
    }

    /// Stop both watchers and release the module
    pub fn shutdown(&mut self) {
        self.module.cancel();
        self.asset.cancel();
        if self.loader.is_open() {
            if let Err(e) = self.loader.close() {
                log::warn!("[ReloadOrchestrator::shutdown] {}", e);
            }
        }
    }
}

impl<S, B, W, D> Drop for ReloadOrchestrator<S, B, W, D>
where
    S: GameState,
    B: ModuleBackend<S>,
    W: WatchSpawner,
    D: Backoff,
{
    fn drop(&mut self) {
        self.module.cancel();
        self.asset.cancel();
    }
}
