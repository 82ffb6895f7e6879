//! File relocation between pipeline directories.
//!
//! Moves prefer an atomic rename and fall back to copy-then-remove for
//! cross-filesystem destinations. The fallback copies to a `.part` name and
//! renames it into place, so an interrupted move never leaves a partial file
//! that looks like a valid recording.

use crate::error::{Result, TrunkscribeError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Moves recordings between the watch root, talkgroup directories, and the
/// quarantine directory.
#[derive(Debug, Clone)]
pub struct Relocator {
    root: PathBuf,
    quarantine: PathBuf,
    extension: String,
}

impl Relocator {
    pub fn new(root: PathBuf, quarantine: PathBuf, extension: String) -> Self {
        Self {
            root,
            quarantine,
            extension,
        }
    }

    /// Move a file into `root/<talkgroup_id>/`, preserving its filename.
    pub fn move_into_talkgroup_dir(&self, path: &Path, talkgroup_id: &str) -> Result<PathBuf> {
        let dest_dir = self.root.join(talkgroup_id);
        let dest = dest_dir.join(file_name_of(path)?);
        move_file(path, &dest)?;
        debug!(from = %path.display(), to = %dest.display(), "moved into talkgroup directory");
        Ok(dest)
    }

    /// Move a file into the quarantine directory unchanged.
    pub fn move_to_quarantine(&self, path: &Path) -> Result<PathBuf> {
        let dest = self.quarantine.join(file_name_of(path)?);
        move_file(path, &dest)?;
        debug!(from = %path.display(), to = %dest.display(), "moved to quarantine");
        Ok(dest)
    }

    /// Move audio files that never got a sidecar back to the watch root.
    ///
    /// Scans every talkgroup subdirectory for an audio file without a
    /// matching `.txt` next to it — the signature of a transcription that
    /// failed after the move — and returns the files it brought back for
    /// reprocessing. The quarantine directory is never scanned.
    pub fn reconcile(&self) -> Result<Vec<PathBuf>> {
        let mut moved = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let subdir = entry.path();
            if !subdir.is_dir() || subdir == self.quarantine {
                continue;
            }

            for file in fs::read_dir(&subdir)? {
                let file = file?;
                let path = file.path();
                if !self.is_audio(&path) {
                    continue;
                }
                let sidecar = path.with_extension("txt");
                if sidecar.exists() {
                    continue;
                }

                let dest = self.root.join(file_name_of(&path)?);
                move_file(&path, &dest)?;
                info!(path = %dest.display(), "orphaned recording moved back for reprocessing");
                moved.push(dest);
            }
        }

        Ok(moved)
    }

    fn is_audio(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }
}

/// Move `src` to `dest`, creating the destination directory as needed.
///
/// The original is only removed once the destination fully exists.
pub fn move_file(src: &Path, dest: &Path) -> Result<()> {
    let relocation_err = |message: String| TrunkscribeError::Relocation {
        from: src.display().to_string(),
        to: dest.display().to_string(),
        message,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| relocation_err(e.to_string()))?;
    }

    // Same-filesystem fast path.
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }

    // Cross-filesystem fallback: copy to a partial name, publish with a
    // rename, then remove the source.
    let partial = dest.with_extension("part");
    fs::copy(src, &partial).map_err(|e| {
        let _ = fs::remove_file(&partial);
        relocation_err(e.to_string())
    })?;
    fs::rename(&partial, dest).map_err(|e| {
        let _ = fs::remove_file(&partial);
        relocation_err(e.to_string())
    })?;
    fs::remove_file(src).map_err(|e| relocation_err(e.to_string()))?;
    Ok(())
}

fn file_name_of(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| TrunkscribeError::Relocation {
        from: path.display().to_string(),
        to: String::new(),
        message: "path has no file name".to_string(),
    })
}
