use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trunkscribe::audio::{AudioProbe, FfmpegReencoder, FfprobeProbe, Reencoder};
use trunkscribe::cli::{Cli, Commands, ConfigAction};
use trunkscribe::config::Config;
use trunkscribe::dictionary::DictionarySet;
use trunkscribe::intake::{DispatcherSettings, IntakeDispatcher, PollWatcher};
use trunkscribe::relocate::Relocator;
use trunkscribe::store::{MemoryStore, RecordingStore, SqliteStore};
use trunkscribe::stt::{OpenAiTranscriber, Transcriber};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut cli = Cli::parse();
    let command = cli.command.take();

    match command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run(config).await
        }
        Some(Commands::Reconcile) => {
            let config = load_config(&cli)?;
            reconcile(config)
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { path } => {
                let path = path.unwrap_or_else(Config::default_path);
                Config::write_default(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Wrote default configuration to {}", path.display());
                Ok(())
            }
            ConfigAction::Path => {
                let path = cli.config.unwrap_or_else(Config::default_path);
                println!("{}", path.display());
                Ok(())
            }
        },
    }
}

/// Resolve configuration with precedence: CLI flags > env vars > config file.
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&path)
        .with_context(|| format!("failed to load {}", path.display()))?
        .with_env_overrides();

    if let Some(root) = &cli.root {
        config.watch.root = root.clone();
    }
    if let Some(quarantine) = &cli.quarantine {
        config.watch.quarantine = quarantine.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Run the intake daemon: reconcile, enumerate, watch, dispatch.
async fn run(config: Config) -> Result<()> {
    info!(version = %trunkscribe::version_string(), "starting trunkscribe");

    // Startup must fail loudly rather than degrade silently.
    if !config.watch.root.is_dir() {
        bail!(
            "watch directory {} does not exist or is not a directory",
            config.watch.root.display()
        );
    }
    std::fs::create_dir_all(&config.watch.quarantine).with_context(|| {
        format!(
            "failed to create quarantine directory {}",
            config.watch.quarantine.display()
        )
    })?;

    let dictionaries = Arc::new(DictionarySet::load(&config.dictionaries).await?);
    let talkgroups = Arc::new(config.talkgroups.clone());
    let radios = Arc::new(config.radios.clone());

    let store: Arc<dyn RecordingStore> = match &config.storage.database {
        Some(path) => Arc::new(SqliteStore::open(path, Arc::clone(&talkgroups)).await?),
        None => {
            info!("no database configured, metadata persistence disabled");
            Arc::new(MemoryStore::new())
        }
    };

    let transcriber: Arc<dyn Transcriber> =
        Arc::new(OpenAiTranscriber::new(config.transcriber.clone())?);
    let probe: Arc<dyn AudioProbe> = Arc::new(FfprobeProbe::new());
    let reencoder: Arc<dyn Reencoder> = Arc::new(FfmpegReencoder::new());
    let relocator = Relocator::new(
        config.watch.root.clone(),
        config.watch.quarantine.clone(),
        config.watch.extension.clone(),
    );

    // Bring orphans home before the first watch scan picks up the root.
    let orphans = relocator.reconcile()?;
    if !orphans.is_empty() {
        info!(count = orphans.len(), "reconcile pass requeued orphaned recordings");
    }

    let dispatcher = IntakeDispatcher::new(
        DispatcherSettings::from(&config),
        relocator,
        dictionaries,
        radios,
        probe,
        reencoder,
        transcriber,
        store,
    );

    let (events_tx, events_rx) = mpsc::channel(256);
    let watcher = PollWatcher::new(
        config.watch.root.clone(),
        config.watch.extension.clone(),
        Duration::from_millis(config.watch.poll_interval_ms),
        Duration::from_secs_f64(config.watch.debounce_secs),
        events_tx,
    );

    let running = Arc::new(AtomicBool::new(true));
    let watcher_handle = tokio::spawn(watcher.run(Arc::clone(&running)));
    let dispatcher_handle = tokio::spawn(dispatcher.run(events_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, draining in-flight work");

    // Stop scheduling new work; the watcher exits and drops the event
    // sender, the dispatcher drains both pools, then we leave.
    running.store(false, Ordering::Relaxed);
    watcher_handle.await.context("watcher task failed")?;
    dispatcher_handle.await.context("dispatcher task failed")?;

    info!("shutdown complete");
    Ok(())
}

/// One-shot reconcile pass for operator use.
fn reconcile(config: Config) -> Result<()> {
    let relocator = Relocator::new(
        config.watch.root.clone(),
        config.watch.quarantine.clone(),
        config.watch.extension.clone(),
    );
    let moved = relocator.reconcile()?;
    println!("Requeued {} recording(s) for reprocessing", moved.len());
    Ok(())
}
