use std::time::Duration;

use reqwest::{Client, StatusCode};

use super::error::LlmError;
use super::types::{LlmRequest, MessagesRequest, MessagesResponse};

const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anything that can turn an [`LlmRequest`] into completion text.
///
/// Implementations report failures through [`LlmError`] and must not retry
/// on their own; retry policy lives in [`invoke_with_retry`](super::invoke_with_retry).
#[allow(async_fn_in_trait)]
pub trait LlmClient {
    async fn invoke(&self, request: &LlmRequest) -> Result<String, LlmError>;
}

impl<T: LlmClient + ?Sized> LlmClient for &T {
    async fn invoke(&self, request: &LlmRequest) -> Result<String, LlmError> {
        (**self).invoke(request).await
    }
}

pub struct AnthropicClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            client,
            base_url,
        }
    }
}

impl LlmClient for AnthropicClient {
    async fn invoke(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let body = MessagesRequest::from(request);
        let response = self
            .client
            .post(&self.base_url)
            .timeout(request.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(LlmError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::AuthError {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::InvalidResponse(format!(
                "status {}: {message}",
                status.as_u16()
            )));
        }

        let body = response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let text = body.text();
        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse("empty completion".into()));
        }
        Ok(text)
    }
}
