//! OpenAI provider (cloud). Any OpenAI-compatible base URL works.

use async_trait::async_trait;

use crate::config::OpenAiSettings;
use crate::error::AiError;
use crate::provider::{AiProvider, ProviderKind, SYSTEM_PROMPT, user_message};
use crate::providers::{http_client, parse_chat_completion, post_json};

pub struct OpenAiProvider {
    pub base_url: String,
    pub model: String,
    api_key: String,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(settings: &OpenAiSettings, timeout_ms: u64) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().unwrap_or_default(),
            timeout_ms,
            client: http_client(timeout_ms),
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn ask(&self, prompt: &str, context: &str) -> Result<String, AiError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_message(prompt, context)}
            ],
            "max_tokens": 1000,
            "temperature": 0.7
        });
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = post_json("openai", request, self.timeout_ms).await?;
        parse_chat_completion("openai", &json)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
}
