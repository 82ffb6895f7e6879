//! Command-line interface for trunkscribe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Transcription daemon for radio-scanner recordings
#[derive(Parser, Debug)]
#[command(
    name = "trunkscribe",
    version,
    about = "Transcription and enrichment daemon for radio-scanner recordings"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Watch directory override (takes precedence over config and env)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Quarantine directory override
    #[arg(long, value_name = "DIR")]
    pub quarantine: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the root directory and transcribe new recordings (default)
    Run,
    /// Move recordings that never got a transcript back for reprocessing
    Reconcile,
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Destination path (defaults to the standard config location)
        path: Option<PathBuf>,
    },
    /// Print the resolved configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["trunkscribe"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_run_with_overrides() {
        let cli = Cli::parse_from([
            "trunkscribe",
            "--root",
            "/srv/recordings",
            "--quarantine",
            "/srv/tooShort",
            "run",
        ]);
        assert!(matches!(cli.command, Some(Commands::Run)));
        assert_eq!(cli.root, Some(PathBuf::from("/srv/recordings")));
        assert_eq!(cli.quarantine, Some(PathBuf::from("/srv/tooShort")));
    }

    #[test]
    fn test_reconcile_subcommand() {
        let cli = Cli::parse_from(["trunkscribe", "reconcile"]);
        assert!(matches!(cli.command, Some(Commands::Reconcile)));
    }

    #[test]
    fn test_config_init_with_path() {
        let cli = Cli::parse_from(["trunkscribe", "config", "init", "/tmp/t.toml"]);
        match cli.command {
            Some(Commands::Config {
                action: ConfigAction::Init { path },
            }) => assert_eq!(path, Some(PathBuf::from("/tmp/t.toml"))),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::parse_from(["trunkscribe", "run", "--config", "/etc/trunkscribe.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/trunkscribe.toml")));
    }
}
