use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;

use crate::error::{HarnessError, HarnessResult};

/// Asset store owned by the host.
///
/// The reload machinery only ever tears it down and builds it back up; what it
/// holds is none of our business.
pub trait AssetStore {
    /// Drop everything currently loaded. Must not fail.
    fn teardown(&mut self);

    /// Load everything again. An error is treated as transient by the
    /// coordinator until the retry budget is spent.
    fn reinitialize(&mut self) -> anyhow::Result<()>;

    /// What the game may see of the store. Stores with nothing to report keep
    /// the empty default.
    fn summary(&self) -> AssetSummary {
        AssetSummary::default()
    }
}

/// Size of the currently loaded asset set
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssetSummary {
    pub count: usize,
    pub bytes: usize,
}

/// Retry bounds for asset reinitialisation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,

    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(10),
        }
    }
}

/// How the coordinator waits between attempts
pub trait Backoff {
    fn pause(&self, attempt: u32, delay: Duration);
}

/// Sleeps the calling thread for the configured delay
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedDelay;

impl Backoff for FixedDelay {
    fn pause(&self, _attempt: u32, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Never waits. Useful in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Backoff for NoDelay {
    fn pause(&self, _attempt: u32, _delay: Duration) {}
}

/// Tears the asset store down and brings it back, riding out short file locks
/// held by editors and build tools.
#[derive(Debug, Clone)]
pub struct AssetReloadCoordinator<D: Backoff = FixedDelay> {
    policy: RetryPolicy,
    backoff: D,
}

impl AssetReloadCoordinator<FixedDelay> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_backoff(policy, FixedDelay)
    }
}

impl<D: Backoff> AssetReloadCoordinator<D> {
    pub fn with_backoff(policy: RetryPolicy, backoff: D) -> Self {
        Self { policy, backoff }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Teardown followed by [`load`](Self::load). On failure the store is left
    /// torn down. Returns the number of attempts used.
    pub fn reload<A: AssetStore + ?Sized>(&self, store: &mut A) -> HarnessResult<u32> {
        store.teardown();
        self.load(store)
    }

    /// Bounded reinitialisation without the teardown step.
    pub fn load<A: AssetStore + ?Sized>(&self, store: &mut A) -> HarnessResult<u32> {
        let attempts = self.policy.attempts.max(1);

        let mut attempt = 1;
        loop {
            match store.reinitialize() {
                Ok(()) => {
                    if attempt > 1 {
                        log::info!(
                            "[AssetReloadCoordinator::load] Assets loaded on attempt {}/{}",
                            attempt,
                            attempts
                        );
                    }
                    return Ok(attempt);
                }
                Err(e) if attempt >= attempts => {
                    log::error!(
                        "[AssetReloadCoordinator::load] Giving up after {} attempts: {:#}",
                        attempts,
                        e
                    );
                    return Err(HarnessError::AssetLoadError {
                        attempts,
                        error: format!("{:#}", e),
                    });
                }
                Err(e) => {
                    log::debug!(
                        "[AssetReloadCoordinator::load] Attempt {}/{} failed: {:#}",
                        attempt,
                        attempts,
                        e
                    );
                    self.backoff.pause(attempt, self.policy.delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// One file held in memory
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub last_modified: SystemTime,
}

/// Asset store that reads every regular file of one directory into memory.
///
/// Subdirectories are skipped, matching the non-recursive watch on the same
/// directory.
#[derive(Debug)]
pub struct FileAssetStore {
    dir: PathBuf,
    assets: HashMap<String, LoadedAsset>,
    loaded: bool,
}

impl FileAssetStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            assets: HashMap::new(),
            loaded: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, name: &str) -> Option<&LoadedAsset> {
        self.assets.get(name)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(|k| k.as_str())
    }

    /// Total bytes held
    pub fn total_bytes(&self) -> usize {
        self.assets.values().map(|a| a.data.len()).sum()
    }
}

impl AssetStore for FileAssetStore {
    fn teardown(&mut self) {
        self.assets.clear();
        self.loaded = false;
    }

    fn summary(&self) -> AssetSummary {
        AssetSummary {
            count: self.len(),
            bytes: self.total_bytes(),
        }
    }

    fn reinitialize(&mut self) -> anyhow::Result<()> {
        // Build into a scratch map so a half-read directory never shows up.
        let mut assets = HashMap::new();

        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("reading asset directory {}", self.dir.display()))?;

        for entry in entries {
            let entry = entry.with_context(|| format!("listing {}", self.dir.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let last_modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or_else(SystemTime::now);
            let name = entry.file_name().to_string_lossy().into_owned();

            assets.insert(
                name,
                LoadedAsset {
                    path,
                    data,
                    last_modified,
                },
            );
        }

        log::info!(
            "[FileAssetStore::reinitialize] Loaded {} assets from {}",
            assets.len(),
            self.dir.display()
        );
        self.assets = assets;
        self.loaded = true;
        Ok(())
    }
}
