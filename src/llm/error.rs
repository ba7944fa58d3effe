//! Error type for LLM invocations.
//!
//! [`LlmError`] carries the four failure classes the orchestration layer
//! distinguishes. Only [`Timeout`](LlmError::Timeout) and
//! [`RateLimited`](LlmError::RateLimited) are retried.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// No reply within the caller-supplied timeout, or the connection dropped.
    #[error("request timed out")]
    Timeout,

    /// HTTP 429 or an overloaded upstream.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The reply could not be turned into text (bad status, bad body, empty completion).
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Credentials rejected (401/403).
    #[error("authentication failed (status {status}): {message}")]
    AuthError { status: u16, message: String },

    /// The run was cancelled before or during the call.
    #[error("request cancelled")]
    Cancelled,
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Timeout | LlmError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            LlmError::Timeout
        } else {
            LlmError::InvalidResponse(err.to_string())
        }
    }
}
