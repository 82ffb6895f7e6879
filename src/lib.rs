//! trunkscribe - transcription and enrichment for radio-scanner recordings
//!
//! Watches a capture directory, gates recordings on duration, transcribes
//! the keepers through a speech-to-text backend, enriches transcripts with
//! dispatch ten-codes, callsigns and agency signals, and files each recording
//! under its talkgroup directory next to a `.txt` sidecar.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dictionary;
pub mod enrich;
pub mod error;
pub mod intake;
pub mod recording;
pub mod relocate;
pub mod store;
pub mod stt;

// Core traits (probe → transcribe → persist)
pub use audio::{AudioProbe, FfmpegReencoder, FfprobeProbe, Reencoder};
pub use store::{MemoryStore, RecordingStore, SqliteStore};
pub use stt::{MockTranscriber, OpenAiTranscriber, Transcriber};

// Pipeline
pub use intake::{DispatcherSettings, IntakeDispatcher, PollWatcher, WatchEvent};

// Error handling
pub use error::{Result, TrunkscribeError};

// Config
pub use config::Config;

// Domain model
pub use recording::{LifecycleState, Recording};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
