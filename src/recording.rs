//! Recording model and the capture-tool filename contract.
//!
//! The upstream capture tool encodes everything we know about a recording in
//! its filename: `20240101_153000..._TO_<talkgroup>..._FROM_<radioid>.mp3`.
//! Parsing happens once at intake; the parsed identity fields never change,
//! while `path`, `state` and the transcript fields evolve as the file moves
//! through the pipeline.

use crate::defaults;
use crate::enrich::EnrichedRecord;
use crate::error::{Result, TrunkscribeError};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use std::path::{Path, PathBuf};
use tracing::info;

/// Lifecycle of one recording from discovery to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Discovered,
    Probing,
    TooShort,
    Queued,
    Transcribing,
    Reencoding,
    Enriching,
    Persisted,
    Failed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Discovered => "DISCOVERED",
            LifecycleState::Probing => "PROBING",
            LifecycleState::TooShort => "TOO_SHORT",
            LifecycleState::Queued => "QUEUED",
            LifecycleState::Transcribing => "TRANSCRIBING",
            LifecycleState::Reencoding => "REENCODING",
            LifecycleState::Enriching => "ENRICHING",
            LifecycleState::Persisted => "PERSISTED",
            LifecycleState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One physical audio file under processing.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Current filesystem location; identity key while in flight.
    pub path: PathBuf,
    /// Original file name, preserved across moves.
    pub file_name: String,
    /// Destination talkgroup id parsed from the filename.
    pub talkgroup_id: String,
    /// Source radio id parsed from the filename.
    pub radio_id: String,
    /// Capture date as written by the capture tool (YYYYMMDD).
    pub captured_date: String,
    /// Capture time in HH:MM display form.
    pub captured_time: String,
    /// Capture timestamp as unix seconds (local clock, like the capture tool).
    pub captured_unix: i64,
    /// Duration in seconds, set by the probe; recomputed after a re-encode.
    pub duration_secs: Option<f64>,
    /// Current lifecycle state.
    pub state: LifecycleState,
    /// Raw backend transcript, set once transcription succeeds.
    pub raw_transcript: Option<String>,
    /// Enriched record, set once enrichment runs.
    pub enriched: Option<EnrichedRecord>,
}

impl Recording {
    /// Parse a recording from its filesystem path.
    ///
    /// # Errors
    /// Returns `FilenameParse` when the date, time, or `TO_` segment is
    /// missing or malformed. A missing `FROM_` segment is tolerated: the
    /// radio id falls back to a placeholder.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrunkscribeError::FilenameParse {
                name: path.display().to_string(),
                reason: "not a valid UTF-8 file name".to_string(),
            })?
            .to_string();

        let parse_err = |reason: &str| TrunkscribeError::FilenameParse {
            name: file_name.clone(),
            reason: reason.to_string(),
        };

        let mut parts = file_name.split('_');
        let date_part = parts.next().ok_or_else(|| parse_err("empty file name"))?;
        let time_part = parts
            .next()
            .ok_or_else(|| parse_err("missing time segment"))?;

        if time_part.len() < 4 || !time_part.as_bytes()[..4].iter().all(u8::is_ascii_digit) {
            return Err(parse_err("time segment is not HHMM digits"));
        }
        let captured_time = format!("{}:{}", &time_part[..2], &time_part[2..4]);

        let date = NaiveDate::parse_from_str(date_part, "%Y%m%d")
            .map_err(|_| parse_err("date segment is not YYYYMMDD"))?;
        let time = NaiveTime::parse_from_str(&captured_time, "%H:%M")
            .map_err(|_| parse_err("time segment out of range"))?;
        let naive = date.and_time(time);
        // Capture timestamps are local wall-clock; fall back to UTC for the
        // one skipped hour a year where the local time does not exist.
        let captured_unix = Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
            .unwrap_or_else(|| naive.and_utc().timestamp());

        let talkgroup_id = digit_run_after(&file_name, "TO_")
            .ok_or_else(|| parse_err("missing TO_<talkgroup> segment"))?;
        let radio_id = digit_run_after(&file_name, "FROM_")
            .unwrap_or_else(|| defaults::UNKNOWN_RADIO_ID.to_string());

        let captured_date = date_part.to_string();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            talkgroup_id,
            radio_id,
            captured_date,
            captured_time,
            captured_unix,
            duration_secs: None,
            state: LifecycleState::Discovered,
            raw_transcript: None,
            enriched: None,
        })
    }

    /// Advance the lifecycle state, logging the transition.
    pub fn transition(&mut self, next: LifecycleState) {
        info!(
            path = %self.path.display(),
            from = %self.state,
            to = %next,
            "state transition"
        );
        self.state = next;
    }

    /// Record a relocation of the underlying file.
    pub fn relocated(&mut self, new_path: PathBuf) {
        self.path = new_path;
    }
}

/// Extract the run of ASCII digits that follows `marker` in `name`.
///
/// Returns None when the marker is absent or not followed by a digit.
fn digit_run_after(name: &str, marker: &str) -> Option<String> {
    let start = name.find(marker)? + marker.len();
    let rest = &name[start..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { Some(digits) }
}
