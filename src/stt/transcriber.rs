//! The speech-to-text seam.

use crate::error::{Result, TrunkscribeError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Trait for speech-to-text transcription of a recording file.
///
/// This trait allows swapping implementations (hosted API vs mock). Whether
/// the backend is a remote service or local model inference is opaque to the
/// pipeline; the call simply occupies its worker for the duration.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `path` to text.
    ///
    /// # Errors
    /// Returns `Transcription` when the backend call fails.
    async fn transcribe(&self, path: &Path) -> Result<String>;

    /// Name of the backend, for logs.
    fn name(&self) -> &str;
}

/// Mock transcriber for testing.
#[derive(Debug)]
pub struct MockTranscriber {
    name: String,
    response: String,
    should_fail: bool,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: "mock transcription".to_string(),
            should_fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Configure the mock to return a specific response.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on transcribe.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Paths transcribed so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().expect("mock poisoned").clone()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, path: &Path) -> Result<String> {
        self.calls
            .lock()
            .expect("mock poisoned")
            .push(path.to_path_buf());

        if self.should_fail {
            Err(TrunkscribeError::Transcription {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new("test-model").with_response("copy 10-4");
        let result = transcriber.transcribe(Path::new("/r/a.mp3")).await;
        assert_eq!(result.unwrap(), "copy 10-4");
    }

    #[tokio::test]
    async fn test_mock_transcriber_returns_error_when_configured() {
        let transcriber = MockTranscriber::new("test-model").with_failure();
        let result = transcriber.transcribe(Path::new("/r/a.mp3")).await;
        match result {
            Err(TrunkscribeError::Transcription { message }) => {
                assert_eq!(message, "mock transcription failure");
            }
            _ => panic!("Expected Transcription error"),
        }
    }

    #[tokio::test]
    async fn test_mock_transcriber_records_calls() {
        let transcriber = MockTranscriber::new("test-model");
        transcriber.transcribe(Path::new("/r/a.mp3")).await.unwrap();
        transcriber.transcribe(Path::new("/r/b.mp3")).await.unwrap();
        assert_eq!(
            transcriber.calls(),
            vec![PathBuf::from("/r/a.mp3"), PathBuf::from("/r/b.mp3")]
        );
    }

    #[test]
    fn test_mock_transcriber_name() {
        let transcriber = MockTranscriber::new("whisper-mock");
        assert_eq!(transcriber.name(), "whisper-mock");
    }

    #[tokio::test]
    async fn test_transcriber_trait_is_object_safe() {
        let transcriber: Box<dyn Transcriber> =
            Box::new(MockTranscriber::new("test-model").with_response("boxed test"));
        let result = transcriber.transcribe(Path::new("/r/a.mp3")).await;
        assert_eq!(result.unwrap(), "boxed test");
    }
}
