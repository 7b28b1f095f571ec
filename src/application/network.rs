//! The network seam the worker falls through to.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{FetchRequest, ResponseSnapshot};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to `{url}` timed out")]
    Timeout { url: String },
    #[error("request to `{url}` failed: {message}")]
    Transport { url: String, message: String },
    #[error("response body from `{url}` exceeds {limit} bytes")]
    BodyTooLarge { url: String, limit: usize },
    #[error("invalid request target `{url}`: {message}")]
    InvalidTarget { url: String, message: String },
}

impl NetworkError {
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Performs a request against the real network.
///
/// An `Err` means no response was produced at all. Error statuses from the
/// remote end are returned as `Ok` responses.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<ResponseSnapshot, NetworkError>;
}
