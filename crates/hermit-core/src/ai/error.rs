//! Error taxonomy for outbound model calls.
//!
//! The split that matters to the agent loop is retryable vs fatal:
//! transient transport failures are retried with backoff, quota and auth
//! failures terminate the current call immediately.

use thiserror::Error;

/// Failure of a model call, classified for retry handling.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Network-level failure or server-side 5xx.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 429 with a transient rate limit.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// Exhausted credits, spending limit, or billing problem. Never retried.
    #[error("quota exhausted: {0}")]
    Quota(String),

    /// Authentication was rejected (HTTP 401/403). Never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The provider returned a body the client could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Whether the retry loop should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::Transport(_) | ModelError::RateLimited { .. } | ModelError::Timeout
        )
    }

    /// Provider-suggested wait before the next attempt, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ModelError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout
        } else {
            ModelError::Transport(err.to_string())
        }
    }
}

/// Result alias for model-call operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Whether an error body describes exhausted credits rather than a
/// transient rate limit. Some providers reuse 429 for both.
pub fn is_quota_exhausted(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("exhausted")
        || lower.contains("spending limit")
        || lower.contains("credits")
        || lower.contains("billing")
        || lower.contains("quota exceeded")
        || lower.contains("insufficient_quota")
}
