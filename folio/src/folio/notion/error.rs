use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("notion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notion returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("notion rate limited the request (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("unexpected notion response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid notion header value for {0}")]
    InvalidHeader(&'static str),
}

impl NotionError {
    pub fn status(&self) -> Option<u16> {
        match self {
            NotionError::Api { status, .. } => Some(*status),
            NotionError::RateLimited { .. } => Some(429),
            NotionError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
