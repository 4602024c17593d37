use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Reddit or YouTube answered with a non-success status.
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("{0} is not a valid subreddit name")]
    InvalidSubreddit(String),

    #[error("video id could not be found in {0}")]
    IdExtraction(String),

    #[error("playlist {0} is not recorded in the store")]
    UnknownPlaylist(String),

    #[error("store error: {0}")]
    Store(#[from] tokio_rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("authorization error: {0}")]
    Auth(String),
}

impl AppError {
    /// True for failures raised by the persistence layer.
    pub fn is_store(&self) -> bool {
        matches!(self, AppError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
