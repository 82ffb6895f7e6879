//! Hosted transcription via an OpenAI-compatible endpoint.
//!
//! Uploads the recording as a multipart form to `/audio/transcriptions` and
//! reads the `text` field of the JSON response. Temperature is pinned to 0 —
//! dispatch audio is noisy enough without sampling variance.

use crate::config::TranscriberConfig;
use crate::error::{Result, TrunkscribeError};
use crate::stt::transcriber::Transcriber;
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Response body of the transcription endpoint.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI-compatible transcription backend.
pub struct OpenAiTranscriber {
    config: TranscriberConfig,
    client: reqwest::Client,
}

impl OpenAiTranscriber {
    pub fn new(config: TranscriberConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TrunkscribeError::Transcription {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, path: &Path) -> Result<String> {
        let transcription_err = |message: String| TrunkscribeError::Transcription { message };

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| transcription_err(format!("failed to read {}: {}", path.display(), e)))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| transcription_err(format!("failed to build upload part: {}", e)))?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .text("temperature", "0");
        if !self.config.language.is_empty() {
            form = form.text("language", self.config.language.clone());
        }

        let mut request = self.client.post(&self.config.endpoint).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        debug!(path = %path.display(), endpoint = %self.config.endpoint, "sending transcription request");

        let response = request
            .send()
            .await
            .map_err(|e| transcription_err(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(transcription_err(format!(
                "endpoint returned {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| transcription_err(format!("unparseable response: {}", e)))?;

        Ok(parsed.text)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
