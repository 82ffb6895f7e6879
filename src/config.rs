//! Configuration loading for trunkscribe.
//!
//! All tunables live in a single TOML file with per-section defaults, so a
//! minimal deployment only has to name its directories. Environment variables
//! override the file for the handful of values that differ between hosts.

use crate::defaults;
use crate::error::{Result, TrunkscribeError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub intake: IntakeConfig,
    pub transcriber: TranscriberConfig,
    pub dictionaries: DictionaryConfig,
    pub storage: StorageConfig,
    /// Talkgroup id -> display name, stored with each persisted recording.
    pub talkgroups: BTreeMap<String, String>,
    /// Radio id -> display name, used for the enriched-record radio label.
    pub radios: BTreeMap<String, String>,
}

/// Watch directory configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory the capture tool writes new recordings into.
    pub root: PathBuf,
    /// Terminal directory for too-short or unrecoverable recordings.
    pub quarantine: PathBuf,
    /// Audio extension considered eligible (without the dot).
    pub extension: String,
    /// Seconds within which repeated creation events for a path are ignored.
    pub debounce_secs: f64,
    /// Milliseconds between watch-directory scans.
    pub poll_interval_ms: u64,
}

/// Intake gating and worker-pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntakeConfig {
    /// Recordings shorter than this many seconds are quarantined without
    /// transcription. 4.0 matches the reference deployment; legacy variants
    /// have used 9.0 and 14.0.
    pub duration_threshold_secs: f64,
    /// Worker count for the duration-probe pool.
    pub probe_workers: usize,
    /// Worker count for the transcription pool.
    pub transcribe_workers: usize,
}

/// Transcription backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriberConfig {
    /// OpenAI-compatible transcription endpoint URL.
    pub endpoint: String,
    /// API key; normally supplied via TRUNKSCRIBE_API_KEY instead.
    pub api_key: Option<String>,
    /// Model name sent with each request.
    pub model: String,
    /// Language hint sent with each request.
    pub language: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Code dictionary sources and selection rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Ten-code file for ordinary talkgroups ("<code> <description>" lines).
    pub ten_codes: Option<PathBuf>,
    /// Ten-code file for agency talkgroups.
    pub agency_ten_codes: Option<PathBuf>,
    /// Signal-phrase file for agency talkgroups.
    pub signals: Option<PathBuf>,
    /// SQLite database holding the callsign registry.
    pub callsign_db: Option<PathBuf>,
    /// Talkgroup ids that select the agency ten-code/signal dictionaries,
    /// e.g. ["52198", "52199", "52201"] for a state-patrol system.
    pub agency_talkgroups: Vec<String>,
}

/// Recordings metadata store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database for recording metadata; omit to disable persistence.
    pub database: Option<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("recordings"),
            quarantine: PathBuf::from("tooShortOrError"),
            extension: defaults::AUDIO_EXTENSION.to_string(),
            debounce_secs: defaults::DEBOUNCE_SECS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            duration_threshold_secs: defaults::DURATION_THRESHOLD_SECS,
            probe_workers: defaults::PROBE_WORKERS,
            transcribe_workers: defaults::TRANSCRIBE_WORKERS,
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::TRANSCRIBE_ENDPOINT.to_string(),
            api_key: None,
            model: defaults::TRANSCRIBE_MODEL.to_string(),
            language: defaults::TRANSCRIBE_LANGUAGE.to_string(),
            timeout_secs: defaults::TRANSCRIBE_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields take their default values; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file is
    /// missing. Invalid TOML still fails.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - TRUNKSCRIBE_ROOT → watch.root
    /// - TRUNKSCRIBE_QUARANTINE → watch.quarantine
    /// - TRUNKSCRIBE_API_KEY → transcriber.api_key
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var("TRUNKSCRIBE_ROOT")
            && !root.is_empty()
        {
            self.watch.root = PathBuf::from(root);
        }

        if let Ok(quarantine) = std::env::var("TRUNKSCRIBE_QUARANTINE")
            && !quarantine.is_empty()
        {
            self.watch.quarantine = PathBuf::from(quarantine);
        }

        if let Ok(key) = std::env::var("TRUNKSCRIBE_API_KEY")
            && !key.is_empty()
        {
            self.transcriber.api_key = Some(key);
        }

        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.intake.probe_workers == 0 {
            return Err(TrunkscribeError::ConfigInvalidValue {
                key: "intake.probe_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.intake.transcribe_workers == 0 {
            return Err(TrunkscribeError::ConfigInvalidValue {
                key: "intake.transcribe_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.intake.duration_threshold_secs < 0.0 {
            return Err(TrunkscribeError::ConfigInvalidValue {
                key: "intake.duration_threshold_secs".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        if self.watch.debounce_secs < 0.0 {
            return Err(TrunkscribeError::ConfigInvalidValue {
                key: "watch.debounce_secs".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        if self.watch.extension.is_empty() || self.watch.extension.starts_with('.') {
            return Err(TrunkscribeError::ConfigInvalidValue {
                key: "watch.extension".to_string(),
                message: "must be a bare extension such as \"mp3\"".to_string(),
            });
        }
        Ok(())
    }

    /// Write a default configuration file, for `trunkscribe config init`.
    pub fn write_default(path: &Path) -> Result<()> {
        let config = Self::default();
        let contents = toml::to_string_pretty(&config).map_err(|e| {
            TrunkscribeError::ConfigInvalidValue {
                key: "<serialization>".to_string(),
                message: e.to_string(),
            }
        })?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// Returns ~/.config/trunkscribe/config.toml on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("trunkscribe")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.watch.extension, "mp3");
        assert_eq!(config.watch.debounce_secs, 1.0);
        assert_eq!(config.intake.duration_threshold_secs, 4.0);
        assert_eq!(config.intake.probe_workers, 15);
        assert_eq!(config.intake.transcribe_workers, 3);
        assert_eq!(config.transcriber.model, "whisper-1");
        assert!(config.talkgroups.is_empty());
        assert!(config.dictionaries.agency_talkgroups.is_empty());
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[watch]
root = "/srv/sdrtrunk/recordings"
quarantine = "/srv/sdrtrunk/tooShortOrError"

[intake]
duration_threshold_secs = 9.0
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.watch.root, PathBuf::from("/srv/sdrtrunk/recordings"));
        assert_eq!(config.intake.duration_threshold_secs, 9.0);
        // Untouched sections keep defaults
        assert_eq!(config.intake.probe_workers, 15);
        assert_eq!(config.watch.debounce_secs, 1.0);
    }

    #[test]
    fn test_load_talkgroup_and_radio_tables() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[talkgroups]
"52198" = "NCSHP Troop C"

[radios]
"1610092" = "FCPD Dispatch"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(
            config.talkgroups.get("52198").map(String::as_str),
            Some("NCSHP Troop C")
        );
        assert_eq!(
            config.radios.get("1610092").map(String::as_str),
            Some("FCPD Dispatch")
        );
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not = valid = toml").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/trunkscribe.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.intake.transcribe_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("transcribe_workers"));
    }

    #[test]
    fn test_validate_rejects_dotted_extension() {
        let mut config = Config::default();
        config.watch.extension = ".mp3".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::write_default(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }
}
