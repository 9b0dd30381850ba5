//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connect timeout after {0} seconds")]
    ConnectTimeout(u64),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Payload parse error: {0}")]
    Parse(String),

    #[error("Poll endpoint returned HTTP {status}: {body}")]
    PollStatus { status: u16, body: String },

    #[error("No polling endpoints configured")]
    NoPollEndpoints,

    #[error("Invalid tick: {0}")]
    InvalidTick(#[from] tickflow_core::CoreError),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
