//! Error types for the detection engine.
//!
//! Nothing in here is fatal to the observed page: scan passes swallow
//! [`ScoutError::InvalidUrl`] per candidate, and sinks report delivery
//! failures back to callers that log and move on.

use thiserror::Error;

/// Detection engine errors
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScoutError>;
