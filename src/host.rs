//! State shared between the host binary and the game module
//!
//! The module receives a raw pointer to [`HostState`], so its layout is fixed
//! with `#[repr(C)]` and only plain-old-data fields live here.

use crate::hot_reload::{AssetSummary, GameState};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostState {
    /// Frames run since the last restart
    pub frame_count: u64,

    /// Seconds per frame, written by the host before each tick
    pub delta_seconds: f32,

    pub player_x: f32,
    pub player_y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,

    /// Arena bounds the module keeps the player inside
    pub arena_width: f32,
    pub arena_height: f32,

    /// How often `init` ran on this state, and with `is_reload` set
    pub init_count: u32,
    pub reload_init_count: u32,

    /// Snapshot of the asset store for the module to read
    pub asset_count: u32,
    pub asset_bytes: u64,

    /// Set non-zero by the module to end the host loop
    pub quit_requested: u32,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            frame_count: 0,
            delta_seconds: 1.0 / 60.0,
            player_x: 0.0,
            player_y: 0.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            arena_width: 100.0,
            arena_height: 100.0,
            init_count: 0,
            reload_init_count: 0,
            asset_count: 0,
            asset_bytes: 0,
            quit_requested: 0,
        }
    }
}

impl GameState for HostState {
    fn shutdown(&mut self) {
        log::debug!(
            "[HostState::shutdown] Discarding state after {} frames",
            self.frame_count
        );
    }

    fn sync_assets(&mut self, assets: AssetSummary) {
        self.asset_count = assets.count as u32;
        self.asset_bytes = assets.bytes as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use crate::hot_reload::{AssetStore, FileAssetStore};
    use tempfile::TempDir;

    #[test]
    fn test_sync_assets() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory for host test");
        fs::write(temp_dir.path().join("a.txt"), "abcd").expect("Failed to write asset");
        fs::write(temp_dir.path().join("b.txt"), "ef").expect("Failed to write asset");

        let mut assets = FileAssetStore::new(temp_dir.path());
        assets.reinitialize().expect("Failed to load assets");

        let mut state = HostState::default();
        state.sync_assets(assets.summary());
        assert_eq!(state.asset_count, 2);
        assert_eq!(state.asset_bytes, 6);
    }
}
