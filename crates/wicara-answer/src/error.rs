use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("answer API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("answer API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("answer API returned an empty or malformed response")]
    EmptyResponse,
}
