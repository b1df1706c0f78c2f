//! Provider implementations, one per [`ProviderKind`](crate::ProviderKind).

mod lmstudio;
mod mock;
mod ollama;
mod openai;

pub use lmstudio::LmStudioProvider;
pub use mock::{MOCK_ANSWER, MockProvider};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use std::time::Duration;

use serde_json::Value;

use crate::error::AiError;

pub(crate) fn http_client(timeout_ms: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .unwrap_or_default()
}

/// `choices[0].message.content` of an OpenAI-compatible chat completion.
pub(crate) fn parse_chat_completion(provider: &str, json: &Value) -> Result<String, AiError> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| AiError::provider(provider, "missing choices[0].message.content"))
}

pub(crate) async fn post_json(
    provider: &str,
    request: reqwest::RequestBuilder,
    timeout_ms: u64,
) -> Result<Value, AiError> {
    let response = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| AiError::from_reqwest(provider, e, timeout_ms))?;
    response
        .json::<Value>()
        .await
        .map_err(|e| AiError::from_reqwest(provider, e, timeout_ms))
}
