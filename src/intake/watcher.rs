//! Directory watching: event type, debouncing, and the poll scanner.
//!
//! The dispatcher only ever sees `WatchEvent`s coming out of a channel; where
//! they come from is this module's business. The default source is a poll
//! scanner that diffs directory listings — it reports a creation the first
//! time a path shows up, which gives the same at-least-once semantics as an
//! inotify-style source, duplicate events included (a file that vanishes and
//! reappears is reported again). The debouncer absorbs those duplicates.

use crate::error::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Filesystem event delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
}

/// Suppresses repeated events for the same path inside a time window.
///
/// Entries idle for several windows are evicted on the way through, so the
/// map stays bounded over long uptimes.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    evict_after: Duration,
    last_forwarded: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            evict_after: window * crate::defaults::DEBOUNCE_EVICT_MULTIPLIER,
            last_forwarded: HashMap::new(),
        }
    }

    /// Decide whether an event for `path` should be forwarded now.
    ///
    /// Updates the path's timestamp when forwarding.
    pub fn should_forward(&mut self, path: &Path) -> bool {
        let now = Instant::now();
        self.last_forwarded
            .retain(|_, seen| now.duration_since(*seen) <= self.evict_after);

        match self.last_forwarded.get(path) {
            Some(seen) if now.duration_since(*seen) <= self.window => false,
            _ => {
                self.last_forwarded.insert(path.to_path_buf(), now);
                true
            }
        }
    }

    /// Number of paths currently remembered.
    pub fn len(&self) -> usize {
        self.last_forwarded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_forwarded.is_empty()
    }
}

/// Poll-based watcher over the root directory.
///
/// Only files directly under the root are eligible: recordings already
/// relocated into talkgroup or quarantine subdirectories must never be
/// re-submitted, so subdirectories are not descended into at all.
pub struct PollWatcher {
    root: PathBuf,
    extension: String,
    interval: Duration,
    debouncer: Debouncer,
    known: HashSet<PathBuf>,
    events: mpsc::Sender<WatchEvent>,
}

impl PollWatcher {
    pub fn new(
        root: PathBuf,
        extension: String,
        interval: Duration,
        debounce_window: Duration,
        events: mpsc::Sender<WatchEvent>,
    ) -> Self {
        Self {
            root,
            extension,
            interval,
            debouncer: Debouncer::new(debounce_window),
            known: HashSet::new(),
            events,
        }
    }

    /// Watch until the running flag clears or the dispatcher goes away.
    ///
    /// The first scan enumerates and submits every eligible file already
    /// present, which is what recovers queued work after a process restart.
    pub async fn run(mut self, running: Arc<AtomicBool>) {
        info!(root = %self.root.display(), "watching for new recordings");
        let mut ticker = tokio::time::interval(self.interval);

        while running.load(Ordering::Relaxed) {
            ticker.tick().await;
            match self.scan() {
                Ok(created) => {
                    for path in created {
                        if self.events.send(WatchEvent::Created(path)).await.is_err() {
                            // Dispatcher dropped its receiver; nothing left to feed.
                            info!("event channel closed, watcher stopping");
                            return;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "watch-directory scan failed"),
            }
        }

        info!("watcher stopped");
    }

    /// Diff the directory listing against the previous scan and return the
    /// paths that newly appeared, debounced.
    fn scan(&mut self) -> Result<Vec<PathBuf>> {
        let mut current = HashSet::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && self.is_eligible(&path) {
                current.insert(path);
            }
        }

        let mut created = Vec::new();
        for path in &current {
            if !self.known.contains(path) {
                if self.debouncer.should_forward(path) {
                    debug!(path = %path.display(), "new recording detected");
                    created.push(path.clone());
                } else {
                    debug!(path = %path.display(), "creation event debounced");
                }
            }
        }
        // Deterministic submission order for a burst of files.
        created.sort();

        self.known = current;
        Ok(created)
    }

    fn is_eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_debouncer_suppresses_inside_window() {
        let mut debouncer = Debouncer::new(Duration::from_secs(60));
        let path = Path::new("/r/a.mp3");
        assert!(debouncer.should_forward(path));
        assert!(!debouncer.should_forward(path));
        assert!(!debouncer.should_forward(path));
    }

    #[test]
    fn test_debouncer_forwards_after_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        let path = Path::new("/r/a.mp3");
        assert!(debouncer.should_forward(path));
        std::thread::sleep(Duration::from_millis(20));
        assert!(debouncer.should_forward(path));
    }

    #[test]
    fn test_debouncer_independent_paths() {
        let mut debouncer = Debouncer::new(Duration::from_secs(60));
        assert!(debouncer.should_forward(Path::new("/r/a.mp3")));
        assert!(debouncer.should_forward(Path::new("/r/b.mp3")));
    }

    #[test]
    fn test_debouncer_evicts_stale_entries() {
        let mut debouncer = Debouncer::new(Duration::from_millis(5));
        debouncer.should_forward(Path::new("/r/a.mp3"));
        assert_eq!(debouncer.len(), 1);

        // Idle well past the eviction horizon.
        std::thread::sleep(Duration::from_millis(50));
        debouncer.should_forward(Path::new("/r/b.mp3"));
        assert_eq!(debouncer.len(), 1, "stale entry for a.mp3 should be gone");
    }

    fn watcher_for(dir: &TempDir, tx: mpsc::Sender<WatchEvent>) -> PollWatcher {
        PollWatcher::new(
            dir.path().to_path_buf(),
            "mp3".to_string(),
            Duration::from_millis(10),
            Duration::from_millis(10),
            tx,
        )
    }

    #[test]
    fn test_scan_reports_new_files_once() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let mut watcher = watcher_for(&dir, tx);

        fs::write(dir.path().join("a.mp3"), "x").unwrap();
        fs::write(dir.path().join("b.mp3"), "x").unwrap();

        let first = watcher.scan().unwrap();
        assert_eq!(first.len(), 2);

        // Unchanged directory: nothing new.
        let second = watcher.scan().unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_scan_ignores_subdirectories_and_other_extensions() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let mut watcher = watcher_for(&dir, tx);

        fs::create_dir(dir.path().join("52198")).unwrap();
        fs::write(dir.path().join("52198/moved.mp3"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("keep.mp3"), "x").unwrap();

        let created = watcher.scan().unwrap();
        assert_eq!(created, vec![dir.path().join("keep.mp3")]);
    }

    #[test]
    fn test_scan_reports_reappearing_file_after_window() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let mut watcher = watcher_for(&dir, tx);

        let path = dir.path().join("a.mp3");
        fs::write(&path, "x").unwrap();
        assert_eq!(watcher.scan().unwrap().len(), 1);

        // File moved away (processed), then brought back by reconcile.
        fs::remove_file(&path).unwrap();
        assert!(watcher.scan().unwrap().is_empty());
        std::thread::sleep(Duration::from_millis(20));
        fs::write(&path, "x").unwrap();
        assert_eq!(watcher.scan().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_delivers_events_and_stops() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let watcher = watcher_for(&dir, tx);
        let running = Arc::new(AtomicBool::new(true));

        fs::write(dir.path().join("a.mp3"), "x").unwrap();

        let handle = tokio::spawn(watcher.run(Arc::clone(&running)));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed early");
        assert_eq!(event, WatchEvent::Created(dir.path().join("a.mp3")));

        running.store(false, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("watcher did not stop")
            .unwrap();
    }
}
