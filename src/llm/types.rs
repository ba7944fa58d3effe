//! Request and response types for LLM calls.
//!
//! [`LlmRequest`] is what stages build; [`MessagesRequest`] and
//! [`MessagesResponse`] are the wire format of the Anthropic `v1/messages`
//! endpoint used by [`AnthropicClient`](super::AnthropicClient).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A provider-neutral completion request with its call options.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on a single attempt; retries get a fresh budget.
    pub timeout: Duration,
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

impl LlmRequest {
    /// Single-turn request with a system prompt.
    pub fn prompt(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 4000,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
            system: Some(system.into()),
            messages: vec![Message::user(user)],
        }
    }

    pub fn with_options(mut self, max_tokens: u32, temperature: f32, timeout: Duration) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self.timeout = timeout;
        self
    }
}

/// Body of a `/v1/messages` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

impl From<&LlmRequest> for MessagesRequest {
    fn from(req: &LlmRequest) -> Self {
        Self {
            model: req.model.clone(),
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            system: req.system.clone(),
            messages: req.messages.clone(),
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl MessagesResponse {
    /// Concatenated text of all `text` blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.content_type == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// One content block; `content_type` is serialised as `"type"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_from_llm_request_keeps_options() {
        let req = LlmRequest::prompt("model-x", "system text", "hello").with_options(
            512,
            0.2,
            Duration::from_secs(5),
        );
        let wire = MessagesRequest::from(&req);
        assert_eq!(wire.model, "model-x");
        assert_eq!(wire.max_tokens, 512);
        assert_eq!(wire.system.as_deref(), Some("system text"));
        assert_eq!(wire.messages, vec![Message::user("hello")]);
    }

    #[test]
    fn system_is_omitted_when_absent() {
        let wire = MessagesRequest {
            model: "m".into(),
            max_tokens: 1,
            temperature: 0.0,
            system: None,
            messages: vec![],
        };
        let json = serde_json::to_string(&wire).unwrap();
        assert!(!json.contains("system"));
    }

    #[test]
    fn response_deserialize_from_api_format() {
        let api_json = r#"{
            "id": "msg_123",
            "content": [{"type": "text", "text": "Response "}, {"type": "text", "text": "here"}],
            "model": "claude-sonnet-4-5-20250929",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 15}
        }"#;
        let resp: MessagesResponse = serde_json::from_str(api_json).unwrap();
        assert_eq!(resp.text(), "Response here");
        assert_eq!(resp.content[0].content_type, "text");
    }

    #[test]
    fn response_null_stop_reason() {
        let json = r#"{
            "id": "msg_456",
            "content": [],
            "model": "test",
            "stop_reason": null,
            "usage": {"input_tokens": 0, "output_tokens": 0}
        }"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.stop_reason, None);
        assert!(resp.text().is_empty());
    }
}
