use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("failed to read audio file: {0}")]
    AudioRead(String),

    #[error("audio data exceeds maximum size: {size} bytes (limit: {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("speech API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("speech API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("no transcription results returned")]
    NoResults,
}
