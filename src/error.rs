//! Error types for trunkscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrunkscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Filename contract errors
    #[error("Unparseable recording filename {name}: {reason}")]
    FilenameParse { name: String, reason: String },

    // Audio probe errors (malformed container)
    #[error("Duration probe failed for {path}: {message}")]
    Probe { path: String, message: String },

    // Re-encode recovery errors
    #[error("Re-encode failed for {path}: {message}")]
    Recovery { path: String, message: String },

    // Transcription backend errors
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    // Dictionary loading errors
    #[error("Failed to load dictionary {path}: {message}")]
    Dictionary { path: String, message: String },

    // Metadata store errors
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    // File relocation errors
    #[error("Failed to move {from} to {to}: {message}")]
    Relocation {
        from: String,
        to: String,
        message: String,
    },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TrunkscribeError>;
