//! Speech-to-text adapter for the Wicara relay.
//!
//! Sends a single-channel audio recording to a cloud speech-recognition API
//! (one `speech:recognize` call, no streaming, no retry) and returns the
//! concatenated transcript of the top-ranked alternative of each result.
//! An empty transcript is reported as [`SpeechError::NoResults`], never as
//! a silent empty-string success.

pub mod error;

pub use error::SpeechError;

use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::Path;

/// Maximum audio input size (10 MiB). Prevents OOM from oversized payloads.
const MAX_AUDIO_INPUT_BYTES: usize = 10 * 1024 * 1024;

fn default_endpoint() -> String {
    "https://speech.googleapis.com".to_string()
}

fn default_language_code() -> String {
    "id-ID".to_string()
}

/// Configuration for the speech-recognition backend.
#[derive(Clone, Deserialize)]
pub struct SpeechConfig {
    /// Base URL of the speech API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Static bearer credential for the speech API.
    pub access_token: String,

    /// BCP-47 language code sent with every recognition request.
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

impl SpeechConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            endpoint: default_endpoint(),
            access_token: access_token.into(),
            language_code: default_language_code(),
        }
    }
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"[REDACTED]")
            .field("language_code", &self.language_code)
            .finish()
    }
}

/// Shape of the recognition response we consume. Fields we do not use
/// (confidence, word offsets) are ignored by serde.
#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
}

/// Client for one-shot audio transcription.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    config: SpeechConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> Self {
        let http = reqwest::Client::builder().build().unwrap_or_default();
        Self { http, config }
    }

    /// Reads an audio file from disk and transcribes it.
    pub async fn transcribe_file(&self, path: &Path) -> Result<String, SpeechError> {
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| SpeechError::AudioRead(format!("{}: {}", path.display(), e)))?;
        self.transcribe(&audio).await
    }

    /// Transcribes a raw audio buffer. Single attempt, no retry.
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String, SpeechError> {
        if audio.len() > MAX_AUDIO_INPUT_BYTES {
            return Err(SpeechError::TooLarge {
                size: audio.len(),
                limit: MAX_AUDIO_INPUT_BYTES,
            });
        }

        let content = base64::engine::general_purpose::STANDARD.encode(audio);
        let body = json!({
            "config": {
                "languageCode": self.config.language_code,
                "enableAutomaticPunctuation": true,
            },
            "audio": { "content": content },
        });

        let url = format!(
            "{}/v1/speech:recognize",
            self.config.endpoint.trim_end_matches('/')
        );

        tracing::info!(bytes = audio.len(), "sending audio to speech-to-text");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %body,
                "speech-to-text call failed"
            );
            return Err(SpeechError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RecognizeResponse = resp.json().await?;
        match collect_transcript(&parsed) {
            Some(text) => {
                tracing::info!(transcript = %text, "transcription finished");
                Ok(text)
            }
            None => {
                tracing::warn!("no transcription results found");
                Err(SpeechError::NoResults)
            }
        }
    }
}

/// Concatenates the top-ranked alternative of each result, separated by a
/// space, and trims the tail. Returns `None` when nothing usable came back.
fn collect_transcript(resp: &RecognizeResponse) -> Option<String> {
    let mut transcript = String::new();
    for result in &resp.results {
        if let Some(alt) = result.alternatives.first() {
            transcript.push_str(&alt.transcript);
            transcript.push(' ');
        }
    }

    let trimmed = transcript.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
