//! Per-file transcription locks.
//!
//! A duplicated creation event that slips past the debouncer must not race
//! the same physical file into two concurrent transcriptions. The registry
//! hands out one async mutex per in-flight path; the guard's Drop evicts the
//! entry once the last interested task is done, so the table never retains a
//! stale entry after teardown, success or failure alike.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<PathBuf, Arc<AsyncMutex<()>>>;

/// Registry of per-path mutual-exclusion handles.
#[derive(Debug, Clone, Default)]
pub struct FileLockRegistry {
    inner: Arc<Mutex<LockMap>>,
}

impl FileLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `path`, creating its entry on first dispatch.
    ///
    /// The returned guard holds exclusive access for the path until dropped.
    pub async fn lock(&self, path: &Path) -> FileLockGuard {
        let entry = {
            let mut map = self.inner.lock().expect("lock registry poisoned");
            Arc::clone(
                map.entry(path.to_path_buf())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = entry.lock_owned().await;
        FileLockGuard {
            registry: Arc::clone(&self.inner),
            path: path.to_path_buf(),
            _guard: guard,
        }
    }

    /// Number of paths currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one in-flight path.
///
/// Dropping the guard releases the lock and, once no other task holds or
/// awaits the same entry, removes it from the registry.
pub struct FileLockGuard {
    registry: Arc<Mutex<LockMap>>,
    path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let mut map = self.registry.lock().expect("lock registry poisoned");
        if let Some(entry) = map.get(&self.path) {
            // Two references mean the map and this guard: nobody else is
            // holding or waiting, so the entry can go. A waiter keeps its own
            // clone and re-locks the same mutex, preserving exclusivity even
            // if it outlives the map entry.
            if Arc::strong_count(entry) == 2 {
                map.remove(&self.path);
            }
        }
    }
}
