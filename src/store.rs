//! Recording metadata persistence.
//!
//! The filesystem is the source of truth; the store is a best-effort index
//! over it. Insert failures are reported to the caller, logged there, and
//! never affect file placement. Re-inserting the same recording after a
//! reconcile pass is expected and harmless.

use crate::enrich::EnrichedRecord;
use crate::error::{Result, TrunkscribeError};
use crate::recording::Recording;
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Trait for the downstream recording store.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    /// Persist one transcribed recording with its enriched record.
    ///
    /// # Errors
    /// Returns `Persistence` on store failure; callers log and continue.
    async fn record_transcription(
        &self,
        recording: &Recording,
        enriched: &EnrichedRecord,
    ) -> Result<()>;
}

/// SQLite-backed store, schema-compatible with the capture tool's database.
pub struct SqliteStore {
    pool: SqlitePool,
    talkgroups: Arc<BTreeMap<String, String>>,
}

impl SqliteStore {
    /// Open (creating if needed) the recordings database and ensure the
    /// schema exists.
    pub async fn open(path: &Path, talkgroups: Arc<BTreeMap<String, String>>) -> Result<Self> {
        let persistence_err = |message: String| TrunkscribeError::Persistence { message };

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| persistence_err(format!("failed to open {}: {}", path.display(), e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                date TEXT,
                time TEXT,
                unixtime INTEGER,
                talkgroup_id INTEGER,
                talkgroup_name TEXT,
                radio_id INTEGER,
                duration TEXT,
                filename TEXT,
                filepath TEXT,
                transcription TEXT,
                v2transcription TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| persistence_err(format!("failed to ensure schema: {}", e)))?;

        info!(path = %path.display(), "recordings database ready");
        Ok(Self { pool, talkgroups })
    }
}

#[async_trait]
impl RecordingStore for SqliteStore {
    async fn record_transcription(
        &self,
        recording: &Recording,
        enriched: &EnrichedRecord,
    ) -> Result<()> {
        let talkgroup_name = self.talkgroups.get(&recording.talkgroup_id).cloned();
        let duration = recording
            .duration_secs
            .map(|d| d.to_string())
            .unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO recordings
                (date, time, unixtime, talkgroup_id, talkgroup_name, radio_id,
                 duration, filename, filepath, transcription, v2transcription)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&recording.captured_date)
        .bind(&recording.captured_time)
        .bind(recording.captured_unix)
        .bind(&recording.talkgroup_id)
        .bind(talkgroup_name)
        .bind(&recording.radio_id)
        .bind(duration)
        .bind(&recording.file_name)
        .bind(recording.path.display().to_string())
        .bind(recording.raw_transcript.as_deref().unwrap_or_default())
        .bind(enriched.to_sidecar_json())
        .execute(&self.pool)
        .await
        .map_err(|e| TrunkscribeError::Persistence {
            message: format!("insert failed for {}: {}", recording.file_name, e),
        })?;

        Ok(())
    }
}

/// In-memory store used when no database is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    should_fail: bool,
    records: Mutex<Vec<(Recording, EnrichedRecord)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the store to fail every insert.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Recordings persisted so far.
    pub fn records(&self) -> Vec<(Recording, EnrichedRecord)> {
        self.records.lock().expect("store poisoned").clone()
    }
}

#[async_trait]
impl RecordingStore for MemoryStore {
    async fn record_transcription(
        &self,
        recording: &Recording,
        enriched: &EnrichedRecord,
    ) -> Result<()> {
        if self.should_fail {
            return Err(TrunkscribeError::Persistence {
                message: "memory store configured to fail".to_string(),
            });
        }
        self.records
            .lock()
            .expect("store poisoned")
            .push((recording.clone(), enriched.clone()));
        Ok(())
    }
}
