//! The orchestration core: duration gate, worker pools, per-file locks, and
//! the lifecycle state machine.
//!
//! Two independent pools bound the work. Probing is cheap header I/O and gets
//! a wide pool; transcription is the expensive stage and gets a narrow one,
//! so a burst of new recordings never starves active transcriptions and vice
//! versa. Every per-file failure is isolated: one bad recording logs and
//! reaches a terminal state without disturbing anything else in flight.

use crate::audio::reencode::{self, Reencoder};
use crate::audio::AudioProbe;
use crate::config::Config;
use crate::dictionary::DictionarySet;
use crate::enrich;
use crate::intake::locks::FileLockRegistry;
use crate::intake::watcher::WatchEvent;
use crate::recording::{LifecycleState, Recording};
use crate::relocate::Relocator;
use crate::store::RecordingStore;
use crate::stt::Transcriber;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Dispatcher tunables, lifted out of the full configuration.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub quarantine: PathBuf,
    pub duration_threshold_secs: f64,
    pub probe_workers: usize,
    pub transcribe_workers: usize,
}

impl From<&Config> for DispatcherSettings {
    fn from(config: &Config) -> Self {
        Self {
            quarantine: config.watch.quarantine.clone(),
            duration_threshold_secs: config.intake.duration_threshold_secs,
            probe_workers: config.intake.probe_workers,
            transcribe_workers: config.intake.transcribe_workers,
        }
    }
}

/// The intake orchestrator.
pub struct IntakeDispatcher {
    settings: DispatcherSettings,
    relocator: Relocator,
    dictionaries: Arc<DictionarySet>,
    radios: Arc<BTreeMap<String, String>>,
    probe: Arc<dyn AudioProbe>,
    reencoder: Arc<dyn Reencoder>,
    transcriber: Arc<dyn Transcriber>,
    store: Arc<dyn RecordingStore>,
    locks: FileLockRegistry,
    probe_pool: Arc<Semaphore>,
    transcribe_pool: Arc<Semaphore>,
}

impl IntakeDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: DispatcherSettings,
        relocator: Relocator,
        dictionaries: Arc<DictionarySet>,
        radios: Arc<BTreeMap<String, String>>,
        probe: Arc<dyn AudioProbe>,
        reencoder: Arc<dyn Reencoder>,
        transcriber: Arc<dyn Transcriber>,
        store: Arc<dyn RecordingStore>,
    ) -> Arc<Self> {
        let probe_pool = Arc::new(Semaphore::new(settings.probe_workers));
        let transcribe_pool = Arc::new(Semaphore::new(settings.transcribe_workers));
        Arc::new(Self {
            settings,
            relocator,
            dictionaries,
            radios,
            probe,
            reencoder,
            transcriber,
            store,
            locks: FileLockRegistry::new(),
            probe_pool,
            transcribe_pool,
        })
    }

    /// Per-file lock table, exposed for shutdown assertions.
    pub fn locks(&self) -> &FileLockRegistry {
        &self.locks
    }

    /// Consume watch events until the channel closes, then drain in-flight
    /// work before returning.
    ///
    /// Acquiring the probe permit *before* spawning gives natural
    /// backpressure: once the probe pool is saturated, event intake pauses
    /// instead of piling up unbounded tasks.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<WatchEvent>) {
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(WatchEvent::Created(path)) => {
                        let Ok(permit) = Arc::clone(&self.probe_pool).acquire_owned().await
                        else {
                            break;
                        };
                        let this = Arc::clone(&self);
                        tasks.spawn(this.process(path, permit));
                    }
                    None => break,
                },
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        error!(error = %e, "intake task panicked");
                    }
                }
            }
        }

        // Event source gone: wait for everything still in flight.
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "intake task panicked");
            }
        }
        info!("dispatcher drained");
    }

    /// Full per-file flow: probe and gate while holding a probe-pool permit,
    /// then the locked transcription sequence under a transcription-pool
    /// permit.
    async fn process(self: Arc<Self>, path: PathBuf, probe_permit: OwnedSemaphorePermit) {
        let queued = self.probe_and_gate(&path).await;
        // Free the probe slot before queueing on the transcription pool; the
        // pools stay independent.
        drop(probe_permit);

        if let Some(recording) = queued {
            let Ok(_permit) = Arc::clone(&self.transcribe_pool).acquire_owned().await else {
                return;
            };
            self.transcribe_and_finish(recording).await;
        }
    }

    /// DISCOVERED → PROBING and onward to QUEUED, TOO_SHORT, or a terminal
    /// failure, including the single re-encode retry.
    async fn probe_and_gate(&self, path: &Path) -> Option<Recording> {
        if !path.exists() {
            debug!(path = %path.display(), "file vanished before probing");
            return None;
        }

        let mut recording = match Recording::from_path(path) {
            Ok(recording) => recording,
            Err(e) => {
                // Hard error for this file only: surface it and leave the
                // file in place for operator triage. Never delete it.
                error!(
                    path = %path.display(),
                    error = %e,
                    "filename violates capture contract, marking failed and leaving in place"
                );
                return None;
            }
        };

        recording.transition(LifecycleState::Probing);
        match self.probe.duration_secs(path).await {
            Ok(duration) => self.gate(recording, duration),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "probe failed, attempting re-encode");
                recording.transition(LifecycleState::Reencoding);
                self.recover_and_regate(recording).await
            }
        }
    }

    /// Apply the duration gate to a successfully probed recording.
    fn gate(&self, mut recording: Recording, duration: f64) -> Option<Recording> {
        recording.duration_secs = Some(duration);

        if duration < self.settings.duration_threshold_secs {
            recording.transition(LifecycleState::TooShort);
            info!(
                path = %recording.path.display(),
                duration,
                threshold = self.settings.duration_threshold_secs,
                "recording too short, quarantining"
            );
            match self.relocator.move_to_quarantine(&recording.path) {
                Ok(dest) => recording.relocated(dest),
                Err(e) => error!(
                    path = %recording.path.display(),
                    error = %e,
                    "failed to quarantine short recording"
                ),
            }
            None
        } else {
            recording.transition(LifecycleState::Queued);
            Some(recording)
        }
    }

    /// REENCODING: exactly one repair attempt, then re-probe. A second
    /// failure is terminal and quarantines the original unmodified.
    async fn recover_and_regate(&self, mut recording: Recording) -> Option<Recording> {
        let original = recording.path.clone();
        let temp = reencode::temp_artifact_path(&self.settings.quarantine, &original);

        if let Err(e) = self.reencoder.reencode(&original, &temp).await {
            error!(path = %original.display(), error = %e, "re-encode failed, quarantining original");
            let _ = std::fs::remove_file(&temp);
            recording.transition(LifecycleState::Failed);
            self.quarantine_best_effort(&original);
            return None;
        }

        // Retry the probe against the repaired copy before promoting it.
        recording.transition(LifecycleState::Probing);
        match self.probe.duration_secs(&temp).await {
            Ok(duration) => {
                if let Err(e) = reencode::promote_repaired(&temp, &original) {
                    error!(path = %original.display(), error = %e, "failed to promote repaired copy");
                    let _ = std::fs::remove_file(&temp);
                    recording.transition(LifecycleState::Failed);
                    self.quarantine_best_effort(&original);
                    return None;
                }
                info!(path = %original.display(), "re-encode recovered a readable copy");
                self.gate(recording, duration)
            }
            Err(e) => {
                error!(
                    path = %original.display(),
                    error = %e,
                    "repaired copy still unreadable, quarantining original"
                );
                let _ = std::fs::remove_file(&temp);
                recording.transition(LifecycleState::Failed);
                self.quarantine_best_effort(&original);
                None
            }
        }
    }

    /// Best-effort terminal quarantine. The move copies before it removes,
    /// so a relocation failure leaves the original where it was rather than
    /// losing data.
    fn quarantine_best_effort(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        if let Err(e) = self.relocator.move_to_quarantine(path) {
            error!(
                path = %path.display(),
                error = %e,
                "failed to quarantine, original left in place"
            );
        }
    }

    /// QUEUED → TRANSCRIBING → ENRICHING → PERSISTED, all under the per-file
    /// lock. The lock entry is evicted when the guard drops, whatever the
    /// outcome.
    async fn transcribe_and_finish(&self, mut recording: Recording) {
        let _lock = self.locks.lock(&recording.path).await;

        // A duplicate submission that lost the race finds the file already
        // moved: exactly one transcription per physical file.
        if !recording.path.exists() {
            debug!(path = %recording.path.display(), "already processed, skipping");
            return;
        }

        // Move first, transcribe against the new path. A transcription
        // failure must not leave the file in the watch root, or it would be
        // re-submitted forever.
        let moved = match self
            .relocator
            .move_into_talkgroup_dir(&recording.path, &recording.talkgroup_id)
        {
            Ok(path) => path,
            Err(e) => {
                error!(
                    path = %recording.path.display(),
                    error = %e,
                    "failed to move into talkgroup directory"
                );
                recording.transition(LifecycleState::Failed);
                return;
            }
        };
        recording.relocated(moved);
        recording.transition(LifecycleState::Transcribing);

        let text = match self.transcriber.transcribe(&recording.path).await {
            Ok(text) => text,
            Err(e) => {
                // No sidecar is written, which is exactly what reconcile()
                // looks for; no automatic retry against a failing backend.
                error!(
                    path = %recording.path.display(),
                    error = %e,
                    "transcription failed, file left for reconciliation"
                );
                recording.transition(LifecycleState::Failed);
                return;
            }
        };
        debug!(path = %recording.path.display(), backend = self.transcriber.name(), "transcription complete");
        recording.raw_transcript = Some(text.clone());

        recording.transition(LifecycleState::Enriching);
        let dictionary = self.dictionaries.select(&recording.talkgroup_id);
        let radio_label = enrich::format_radio_label(&self.radios, &recording.radio_id);
        let enriched = enrich::enrich(&text, dictionary, radio_label);

        let sidecar = recording.path.with_extension("txt");
        if let Err(e) = std::fs::write(&sidecar, enriched.to_sidecar_json()) {
            error!(
                path = %sidecar.display(),
                error = %e,
                "sidecar write failed, file left for reconciliation"
            );
            recording.transition(LifecycleState::Failed);
            return;
        }

        if let Err(e) = self.store.record_transcription(&recording, &enriched).await {
            // Filesystem state is the source of truth; the store is
            // best-effort and a failure here changes nothing on disk.
            warn!(path = %recording.path.display(), error = %e, "metadata persistence failed");
        }
        recording.enriched = Some(enriched);
        recording.transition(LifecycleState::Persisted);
        info!(
            path = %recording.path.display(),
            talkgroup = %recording.talkgroup_id,
            "recording transcribed and filed"
        );
    }
}
