//! Ollama provider: local model via the Ollama HTTP API.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::OllamaSettings;
use crate::error::AiError;
use crate::provider::{AiProvider, ProviderKind, SYSTEM_PROMPT, user_message};
use crate::providers::{http_client, post_json};

pub struct OllamaProvider {
    pub base_url: String,
    pub model: String,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(settings: &OllamaSettings, timeout_ms: u64) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            timeout_ms,
            client: http_client(timeout_ms),
        }
    }

    pub fn parse_response(json: &Value) -> Result<String, AiError> {
        json.get("response")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| AiError::provider("ollama", "missing 'response' field"))
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    async fn ask(&self, prompt: &str, context: &str) -> Result<String, AiError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": format!("{SYSTEM_PROMPT}\n\n{}", user_message(prompt, context)),
            "stream": false
        });
        let request = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body);
        let json = post_json("ollama", request, self.timeout_ms).await?;
        Self::parse_response(&json)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: String) -> OllamaSettings {
        OllamaSettings {
            base_url,
            model: "llama2".into(),
        }
    }

    #[test]
    fn test_parse_response() {
        let raw = serde_json::json!({"response": "  All values are normal.\n"});
        assert_eq!(
            OllamaProvider::parse_response(&raw).unwrap(),
            "All values are normal."
        );
        assert!(OllamaProvider::parse_response(&serde_json::json!({})).is_err());
    }

    #[tokio::test]
    async fn test_ask_posts_generate_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"model": "llama2", "stream": false})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&settings(format!("{}/", server.uri())), 5_000);
        assert_eq!(provider.ask("question", "context").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_server_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&settings(server.uri()), 5_000);
        let err = provider.ask("q", "").await.unwrap_err();
        assert!(matches!(err, AiError::Provider { transient: false, .. }));
    }
}
