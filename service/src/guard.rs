//! [`Guard`] preventing redemption runs from overlapping.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing as log;

/// Single-flight guard of redemption runs.
///
/// Acquisition never waits: a run finding the [`Guard`] held is skipped.
///
/// A [`Guard`] created via [`Guard::with_lock_file()`] additionally holds an
/// advisory lock on the provided file, so runs of different processes sharing
/// that file don't overlap either.
#[derive(Clone, Debug, Default)]
pub struct Guard {
    /// Lock of the runs within this process.
    local: Arc<Mutex<()>>,

    /// Path to the file locked for the runs across processes.
    lock_file: Option<Arc<Path>>,
}

impl Guard {
    /// Creates a new [`Guard`] shared by every process locking the provided
    /// file.
    ///
    /// The file is created on the first acquisition.
    #[must_use]
    pub fn with_lock_file(path: impl Into<PathBuf>) -> Self {
        Self {
            local: Arc::default(),
            lock_file: Some(path.into().into()),
        }
    }

    /// Tries to acquire this [`Guard`] on behalf of the provided `holder`.
    ///
    /// [`None`] is returned if the [`Guard`] is held already, or its lock
    /// file cannot be locked.
    #[must_use]
    pub fn try_acquire(&self, holder: impl fmt::Display) -> Option<Permit> {
        let Ok(local) = Arc::clone(&self.local).try_lock_owned() else {
            log::debug!(
                "redemption run of {holder} skipped: another one is in progress",
            );
            return None;
        };

        let file = match self.lock_file.as_deref().map(try_lock) {
            None => None,
            Some(Ok(Some(file))) => Some(file),
            Some(Ok(None)) => {
                log::debug!(
                    "redemption run of {holder} skipped: another process runs \
                     one",
                );
                return None;
            }
            Some(Err(e)) => {
                log::warn!("redemption run of {holder} skipped: {e}");
                return None;
            }
        };

        log::debug!("redemption run of {holder} started");
        Some(Permit {
            _local: local,
            _file: file,
            holder: holder.to_string(),
        })
    }
}

/// Tries to lock the file at the provided `path` exclusively.
///
/// [`None`] is returned if the file is locked by someone else.
fn try_lock(path: &Path) -> io::Result<Option<fs::File>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("cannot open `{}`: {e}", path.display()),
            )
        })?;
    match file.try_lock() {
        Ok(()) => Ok(Some(file)),
        Err(fs::TryLockError::WouldBlock) => Ok(None),
        Err(fs::TryLockError::Error(e)) => Err(e),
    }
}

/// Proof of holding a [`Guard`], releasing it once dropped.
#[derive(Debug)]
pub struct Permit {
    /// Acquired lock of this process.
    _local: OwnedMutexGuard<()>,

    /// Locked file, unlocked once closed.
    _file: Option<fs::File>,

    /// Description of the run holding the [`Guard`].
    holder: String,
}

impl Drop for Permit {
    fn drop(&mut self) {
        log::debug!("redemption run of {} finished", self.holder);
    }
}
