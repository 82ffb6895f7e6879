//! Re-encode recovery for malformed containers.
//!
//! Capture tools occasionally truncate a header mid-write; a straight
//! re-encode through `ffmpeg` usually yields a readable copy. The repaired
//! file is produced at a temp path inside the quarantine directory — never
//! the watch root, which would re-trigger the watcher — and promoted over the
//! original only on success.

use crate::defaults;
use crate::error::{Result, TrunkscribeError};
use crate::relocate;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::process::Command;

/// Trait for re-encode recovery.
///
/// This trait allows swapping implementations (real ffmpeg vs mock).
#[async_trait]
pub trait Reencoder: Send + Sync {
    /// Re-encode `source` into a repaired copy at `temp`.
    ///
    /// # Errors
    /// Returns `Recovery` when the transcode fails; the temp artifact is
    /// removed before returning.
    async fn reencode(&self, source: &Path, temp: &Path) -> Result<()>;
}

/// ffmpeg-backed re-encoder (overwrite-if-exists, same codec target).
#[derive(Debug, Clone)]
pub struct FfmpegReencoder {
    command: String,
}

impl FfmpegReencoder {
    pub fn new() -> Self {
        Self {
            command: "ffmpeg".to_string(),
        }
    }

    /// Override the ffmpeg binary name/path.
    pub fn with_command(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

impl Default for FfmpegReencoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reencoder for FfmpegReencoder {
    async fn reencode(&self, source: &Path, temp: &Path) -> Result<()> {
        let recovery_err = |message: String| TrunkscribeError::Recovery {
            path: source.display().to_string(),
            message,
        };

        if let Some(parent) = temp.parent() {
            std::fs::create_dir_all(parent).map_err(|e| recovery_err(e.to_string()))?;
        }

        let output = Command::new(&self.command)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(source)
            .arg(temp)
            .output()
            .await
            .map_err(|e| recovery_err(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let _ = std::fs::remove_file(temp);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(recovery_err(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Temp-artifact path for a re-encode: the original stem plus a marker
/// suffix, inside the quarantine directory.
pub fn temp_artifact_path(quarantine: &Path, original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording");
    let name = match original.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}{}.{}", stem, defaults::REENCODE_TEMP_SUFFIX, ext),
        None => format!("{}{}", stem, defaults::REENCODE_TEMP_SUFFIX),
    };
    quarantine.join(name)
}

/// Replace the original with the repaired copy, in place.
///
/// Downstream logic keeps using the original path and never learns that a
/// re-encode happened.
pub fn promote_repaired(temp: &Path, original: &Path) -> Result<()> {
    if original.exists() {
        std::fs::remove_file(original)?;
    }
    relocate::move_file(temp, original)
}

/// Mock re-encoder for testing.
#[derive(Debug, Default)]
pub struct MockReencoder {
    should_fail: bool,
    calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl MockReencoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail every re-encode.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// (source, temp) pairs re-encoded so far.
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls.lock().expect("mock poisoned").clone()
    }
}

#[async_trait]
impl Reencoder for MockReencoder {
    async fn reencode(&self, source: &Path, temp: &Path) -> Result<()> {
        self.calls
            .lock()
            .expect("mock poisoned")
            .push((source.to_path_buf(), temp.to_path_buf()));

        if self.should_fail {
            return Err(TrunkscribeError::Recovery {
                path: source.display().to_string(),
                message: "mock re-encode failure".to_string(),
            });
        }

        if let Some(parent) = temp.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(temp, b"repaired")?;
        Ok(())
    }
}
