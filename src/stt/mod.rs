//! Speech-to-text backends.

pub mod openai;
pub mod transcriber;

pub use openai::OpenAiTranscriber;
pub use transcriber::{MockTranscriber, Transcriber};
