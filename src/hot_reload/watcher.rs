use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use super::error::{watcher_error, HotReloadErrorContext};
use crate::error::HarnessResult;

/// Lifecycle of a single watch flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// A watcher is blocked waiting for a change
    Armed,
    /// A change was seen; a reload is pending
    Fired,
    /// The notification backend failed after the watch was armed
    Failed,
}

impl WatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WatchState::Armed,
            1 => WatchState::Fired,
            _ => WatchState::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WatchState::Armed => 0,
            WatchState::Fired => 1,
            WatchState::Failed => 2,
        }
    }
}

struct FlagInner {
    state: AtomicU8,
    failure: Mutex<Option<String>>,
}

/// Change flag shared between one watcher thread and the frame loop.
///
/// The watcher only ever moves it out of `Armed`; the frame loop only ever
/// moves it back to `Armed`, right before spawning the next watcher.
#[derive(Clone)]
pub struct WatchFlag {
    inner: Arc<FlagInner>,
}

impl WatchFlag {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FlagInner {
                state: AtomicU8::new(WatchState::Armed.as_u8()),
                failure: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> WatchState {
        WatchState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_fired(&self) -> bool {
        self.state() == WatchState::Fired
    }

    /// Reset before a new watcher takes ownership of the flag
    pub fn arm(&self) -> HarnessResult<()> {
        self.inner
            .failure
            .lock()
            .hot_reload_context("watch_flag")?
            .take();
        self.inner
            .state
            .store(WatchState::Armed.as_u8(), Ordering::Release);
        Ok(())
    }

    /// Mark a change. Also used by the manual reload trigger.
    pub fn fire(&self) {
        // A failure stays visible until the flag is re-armed.
        let _ = self.inner.state.compare_exchange(
            WatchState::Armed.as_u8(),
            WatchState::Fired.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn fail(&self, error: impl Into<String>) -> HarnessResult<()> {
        *self
            .inner
            .failure
            .lock()
            .hot_reload_context("watch_flag")? = Some(error.into());
        self.inner
            .state
            .store(WatchState::Failed.as_u8(), Ordering::Release);
        Ok(())
    }

    /// Failure message recorded by the watcher, if any
    pub fn failure(&self) -> HarnessResult<Option<String>> {
        Ok(self
            .inner
            .failure
            .lock()
            .hot_reload_context("watch_flag")?
            .clone())
    }
}

impl Default for WatchFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WatchFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchFlag")
            .field("state", &self.state())
            .finish()
    }
}

/// Messages delivered to a blocked watcher thread
enum WatcherSignal {
    Change(notify::Result<Event>),
    Cancel,
}

/// Handle to a detached one-shot watcher.
///
/// Dropping the handle does not stop the watcher; call [`WatchHandle::cancel`].
pub struct WatchHandle {
    dir: PathBuf,
    cancel_tx: Option<Sender<WatcherSignal>>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Handle with no thread behind it, for spawners that watch by other means
    pub fn detached(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cancel_tx: None,
            thread: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the watcher thread is still blocked
    pub fn is_live(&self) -> bool {
        self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Ask a still-blocked watcher to exit without touching its flag
    pub fn cancel(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(WatcherSignal::Cancel);
        }
        if let Some(thread) = self.thread.take() {
            // The thread exits as soon as it sees the signal; joining keeps the
            // one-live-watcher rule exact.
            if thread.join().is_err() {
                log::warn!("[WatchHandle::cancel] Watcher thread for {} panicked", self.dir.display());
            }
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("dir", &self.dir)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Something that can arm a one-shot directory watcher
pub trait WatchSpawner {
    /// Start watching `dir`. The watch must be active when this returns, so a
    /// change made right afterwards is seen. Errors opening the directory are
    /// returned here rather than inside the thread.
    fn spawn(&self, dir: &Path, flag: WatchFlag) -> HarnessResult<WatchHandle>;
}

/// Watcher backed by the platform notification API through `notify`
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryChangeWatcher;

impl DirectoryChangeWatcher {
    pub fn new() -> Self {
        Self
    }
}

impl WatchSpawner for DirectoryChangeWatcher {
    fn spawn(&self, dir: &Path, flag: WatchFlag) -> HarnessResult<WatchHandle> {
        if !dir.is_dir() {
            return Err(watcher_error(dir, "not a directory"));
        }

        let (tx, rx) = unbounded();
        let event_tx = tx.clone();

        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| {
                let _ = event_tx.send(WatcherSignal::Change(res));
            })
            .map_err(|e| watcher_error(dir, e))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| watcher_error(dir, e))?;

        let owned_dir = dir.to_path_buf();
        let thread_name = format!(
            "watch-{}",
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "dir".to_string())
        );

        let thread = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                // Keep the OS watch alive for as long as we block.
                let _watcher = watcher;
                let signal = loop {
                    match rx.recv() {
                        // Reads are not changes; some backends report opens.
                        Ok(WatcherSignal::Change(Ok(event))) if event.kind.is_access() => continue,
                        other => break other,
                    }
                };
                match signal {
                    Ok(WatcherSignal::Change(Ok(event))) => {
                        log::debug!(
                            "[DirectoryChangeWatcher] Change in {}: {:?}",
                            owned_dir.display(),
                            event.kind
                        );
                        flag.fire();
                    }
                    Ok(WatcherSignal::Change(Err(e))) => {
                        log::error!(
                            "[DirectoryChangeWatcher] Notification error for {}: {}",
                            owned_dir.display(),
                            e
                        );
                        if let Err(lock_err) = flag.fail(e.to_string()) {
                            log::error!("[DirectoryChangeWatcher] {}", lock_err);
                        }
                    }
                    Ok(WatcherSignal::Cancel) => {
                        log::debug!("[DirectoryChangeWatcher] Cancelled watch on {}", owned_dir.display());
                    }
                    Err(_) => {
                        // Every sender is gone; nothing can reach us any more.
                        if let Err(lock_err) = flag.fail("watch channel closed") {
                            log::error!("[DirectoryChangeWatcher] {}", lock_err);
                        }
                    }
                }
            })
            .map_err(|e| watcher_error(dir, e))?;

        log::debug!("[DirectoryChangeWatcher::spawn] Watching {}", dir.display());

        Ok(WatchHandle {
            dir: dir.to_path_buf(),
            cancel_tx: Some(tx),
            thread: Some(thread),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn wait_for(flag: &WatchFlag, state: WatchState) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if flag.state() == state {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_flag_transitions() {
        let flag = WatchFlag::new();
        assert_eq!(flag.state(), WatchState::Armed);

        flag.fire();
        assert!(flag.is_fired());

        flag.arm().expect("Failed to arm flag");
        assert_eq!(flag.state(), WatchState::Armed);

        flag.fail("backend gone").expect("Failed to record failure");
        assert_eq!(flag.state(), WatchState::Failed);
        // Firing does not hide a failure.
        flag.fire();
        assert_eq!(flag.state(), WatchState::Failed);
        assert_eq!(
            flag.failure().expect("Failed to read failure"),
            Some("backend gone".to_string())
        );

        flag.arm().expect("Failed to re-arm flag");
        assert_eq!(flag.failure().expect("Failed to read failure"), None);
    }

    #[test]
    fn test_watcher_fires_on_change() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory for watcher test");
        let flag = WatchFlag::new();
        let handle = DirectoryChangeWatcher::new()
            .spawn(temp_dir.path(), flag.clone())
            .expect("Failed to spawn watcher");

        fs::write(temp_dir.path().join("level.txt"), "v2").expect("Failed to write test file");

        assert!(wait_for(&flag, WatchState::Fired));

        // One-shot: the thread is done once it has fired.
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_live() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!handle.is_live());
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory for watcher test");
        let missing = temp_dir.path().join("does_not_exist");

        let result = DirectoryChangeWatcher::new().spawn(&missing, WatchFlag::new());
        assert!(matches!(
            result,
            Err(crate::error::HarnessError::WatcherError { .. })
        ));
    }

    #[test]
    fn test_cancel_leaves_flag_armed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory for watcher test");
        let flag = WatchFlag::new();
        let handle = DirectoryChangeWatcher::new()
            .spawn(temp_dir.path(), flag.clone())
            .expect("Failed to spawn watcher");

        assert!(handle.is_live());
        handle.cancel();
        assert_eq!(flag.state(), WatchState::Armed);
    }
}
