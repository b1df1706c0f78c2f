//! LM Studio provider: local model behind an OpenAI-compatible endpoint.

use async_trait::async_trait;

use crate::config::LmStudioSettings;
use crate::error::AiError;
use crate::provider::{AiProvider, ProviderKind, SYSTEM_PROMPT, user_message};
use crate::providers::{http_client, parse_chat_completion, post_json};

pub struct LmStudioProvider {
    pub base_url: String,
    pub model: String,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl LmStudioProvider {
    pub fn new(settings: &LmStudioSettings, timeout_ms: u64) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            timeout_ms,
            client: http_client(timeout_ms),
        }
    }
}

#[async_trait]
impl AiProvider for LmStudioProvider {
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
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);
        let json = post_json("lmstudio", request, self.timeout_ms).await?;
        parse_chat_completion("lmstudio", &json)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::LmStudio
    }
}
