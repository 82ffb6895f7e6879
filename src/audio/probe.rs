//! Container-duration probing.
//!
//! Reads the duration from the container header via `ffprobe` — never a full
//! decode, so probing stays cheap enough for a wide worker pool.

use crate::error::{Result, TrunkscribeError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::process::Command;

/// Trait for audio duration probing.
///
/// This trait allows swapping implementations (real ffprobe vs mock).
#[async_trait]
pub trait AudioProbe: Send + Sync {
    /// Read the audio duration in seconds from container metadata.
    ///
    /// # Errors
    /// Returns `Probe` when the container cannot be parsed.
    async fn duration_secs(&self, path: &Path) -> Result<f64>;
}

/// ffprobe-backed duration probe.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    command: String,
}

impl FfprobeProbe {
    pub fn new() -> Self {
        Self {
            command: "ffprobe".to_string(),
        }
    }

    /// Override the ffprobe binary name/path.
    pub fn with_command(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioProbe for FfprobeProbe {
    async fn duration_secs(&self, path: &Path) -> Result<f64> {
        let probe_err = |message: String| TrunkscribeError::Probe {
            path: path.display().to_string(),
            message,
        };

        let output = Command::new(&self.command)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| probe_err(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(probe_err(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|_| probe_err(format!("unparseable duration {:?}", stdout.trim())))
    }
}

/// Mock probe for testing.
///
/// Paths can be given a fixed duration, a permanent failure, or a single
/// failure that clears on first use (the malformed-then-repaired scenario).
#[derive(Debug, Default)]
pub struct MockProbe {
    durations: Mutex<HashMap<PathBuf, f64>>,
    fail: Mutex<HashSet<PathBuf>>,
    fail_once: Mutex<HashSet<PathBuf>>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this duration for the given path.
    pub fn with_duration(self, path: &Path, secs: f64) -> Self {
        self.durations
            .lock()
            .expect("mock poisoned")
            .insert(path.to_path_buf(), secs);
        self
    }

    /// Always fail probes of the given path.
    pub fn with_failure(self, path: &Path) -> Self {
        self.fail
            .lock()
            .expect("mock poisoned")
            .insert(path.to_path_buf());
        self
    }

    /// Fail the first probe of the given path, then behave normally.
    pub fn with_failure_once(self, path: &Path) -> Self {
        self.fail_once
            .lock()
            .expect("mock poisoned")
            .insert(path.to_path_buf());
        self
    }

    /// Paths probed so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().expect("mock poisoned").clone()
    }
}

#[async_trait]
impl AudioProbe for MockProbe {
    async fn duration_secs(&self, path: &Path) -> Result<f64> {
        self.calls
            .lock()
            .expect("mock poisoned")
            .push(path.to_path_buf());

        let failed_once = self.fail_once.lock().expect("mock poisoned").remove(path);
        if failed_once || self.fail.lock().expect("mock poisoned").contains(path) {
            return Err(TrunkscribeError::Probe {
                path: path.display().to_string(),
                message: "mock probe failure".to_string(),
            });
        }

        Ok(self
            .durations
            .lock()
            .expect("mock poisoned")
            .get(path)
            .copied()
            .unwrap_or(10.0))
    }
}
