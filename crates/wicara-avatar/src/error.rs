use thiserror::Error;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("avatar API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("avatar API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("avatar API response incomplete: {0}")]
    IncompleteResponse(String),
}
