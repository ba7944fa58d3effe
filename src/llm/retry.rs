use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::client::LlmClient;
use super::error::LlmError;
use super::types::LlmRequest;

/// Transport-level retry policy for a single LLM call.
///
/// This is independent of category revisions: it only absorbs transient
/// failures of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Upper bound on a single backoff wait.
const MAX_DELAY_MS: u64 = 60_000;

impl RetryConfig {
    /// delay = base_delay_ms * 2^(attempt - 1), capped at one minute.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        2u64.checked_pow(attempt.saturating_sub(1))
            .map_or(MAX_DELAY_MS, |factor| self.base_delay_ms.saturating_mul(factor))
            .min(MAX_DELAY_MS)
    }
}

/// Invoke `client` with bounded retry on `Timeout`/`RateLimited`.
///
/// Each attempt is capped by `request.timeout`. Cancellation is checked
/// before every attempt and while waiting, and wins over an in-flight call.
pub async fn invoke_with_retry<C: LlmClient>(
    client: &C,
    request: &LlmRequest,
    retry: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<String, LlmError> {
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            r = tokio::time::timeout(request.timeout, client.invoke(request)) => {
                r.unwrap_or(Err(LlmError::Timeout))
            }
        };

        match result {
            Ok(text) => return Ok(text),
            Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                attempt += 1;
                let backoff = retry.delay_for_attempt(attempt);
                let delay_ms = match &err {
                    LlmError::RateLimited { retry_after_ms } => backoff.max(*retry_after_ms),
                    _ => backoff,
                };
                tracing::warn!(
                    model = %request.model,
                    attempt,
                    max = retry.max_retries,
                    delay_ms,
                    error = %err,
                    "retrying LLM call"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                    _ = sleep(Duration::from_millis(delay_ms)) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }
}
