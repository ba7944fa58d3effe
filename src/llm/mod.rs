pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::{AnthropicClient, LlmClient};
pub use error::LlmError;
pub use retry::{RetryConfig, invoke_with_retry};
pub use types::{LlmRequest, Message, MessagesRequest, MessagesResponse, Usage};

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{LlmClient, LlmError, LlmRequest};

    /// Replays a fixed script of replies; falls back to `default` when exhausted.
    pub struct ScriptedClient {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        default: Result<String, LlmError>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                default: Err(LlmError::InvalidResponse("script exhausted".into())),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// Always answers `text`.
        pub fn always(text: &str) -> Self {
            let mut client = Self::new(Vec::new());
            client.default = Ok(text.to_string());
            client
        }

        /// Always fails with `err`.
        pub fn failing(err: LlmError) -> Self {
            let mut client = Self::new(Vec::new());
            client.default = Err(err);
            client
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// User prompts seen so far, in call order.
        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl LlmClient for ScriptedClient {
        async fn invoke(&self, request: &LlmRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = request
                .messages
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
                .join("\n");
            self.prompts.lock().unwrap().push(prompt);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.default.clone())
        }
    }
}
