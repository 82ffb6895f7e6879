//! Default configuration constants for trunkscribe.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default minimum duration in seconds for a recording to be transcribed.
///
/// Shorter recordings are keyed-up-and-released squelch blips with no usable
/// speech; they go straight to the quarantine directory. Deployments tuned
/// for busier systems have historically run this as high as 9 or even 14
/// seconds, so it is configuration rather than a fixed rule.
pub const DURATION_THRESHOLD_SECS: f64 = 4.0;

/// Default debounce window in seconds for filesystem creation events.
///
/// Some filesystems and capture tools deliver more than one creation event
/// per file; events for the same path inside this window are suppressed.
pub const DEBOUNCE_SECS: f64 = 1.0;

/// How many debounce windows a path entry may stay idle before it is evicted
/// from the debounce map. Keeps the map bounded over long uptimes.
pub const DEBOUNCE_EVICT_MULTIPLIER: u32 = 5;

/// Default interval in milliseconds between watch-directory scans.
pub const POLL_INTERVAL_MS: u64 = 500;

/// Default worker count for the duration-probe pool.
///
/// Probing only reads container headers, so it is cheap and I/O bound;
/// a wide pool keeps a burst of new recordings from queueing behind the
/// much slower transcription stage.
pub const PROBE_WORKERS: usize = 15;

/// Default worker count for the transcription pool.
///
/// Transcription is the expensive stage (remote API rate limits or local
/// model inference), so it gets its own, much smaller pool.
pub const TRANSCRIBE_WORKERS: usize = 3;

/// Audio file extension the watcher considers eligible.
pub const AUDIO_EXTENSION: &str = "mp3";

/// Default OpenAI-compatible transcription endpoint.
pub const TRANSCRIBE_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default transcription model name.
pub const TRANSCRIBE_MODEL: &str = "whisper-1";

/// Default transcription language code.
pub const TRANSCRIBE_LANGUAGE: &str = "en";

/// Default request timeout in seconds for the transcription endpoint.
pub const TRANSCRIBE_TIMEOUT_SECS: u64 = 30;

/// Suffix appended to the file stem of a re-encode temp artifact.
pub const REENCODE_TEMP_SUFFIX: &str = "_temp";

/// Radio-id label used when a filename carries no FROM_ segment.
pub const UNKNOWN_RADIO_ID: &str = "Unknown ID";
