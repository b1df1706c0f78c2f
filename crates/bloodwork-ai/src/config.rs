//! AI adapter settings, deserialised from the `[ai]` section of the server config.

use serde::{Deserialize, Serialize};

use crate::error::AiError;
use crate::provider::ProviderKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider used when a request does not pick one
    pub provider: ProviderKind,
    /// Providers a request may select. The default provider is always included.
    pub enabled: Vec<ProviderKind>,
    /// Allow patient data to leave the machine
    pub send_to_cloud: bool,
    /// Tried once when the selected provider fails. Unset means no fallback.
    pub fallback_provider: Option<ProviderKind>,
    pub timeout_ms: u64,
    /// Retry once after a transient network failure
    pub retry_transient: bool,
    pub retry_backoff_ms: u64,
    pub ollama: OllamaSettings,
    pub lmstudio: LmStudioSettings,
    pub openai: OpenAiSettings,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            enabled: ProviderKind::ALL.to_vec(),
            send_to_cloud: false,
            fallback_provider: None,
            timeout_ms: 30_000,
            retry_transient: false,
            retry_backoff_ms: 250,
            ollama: OllamaSettings::default(),
            lmstudio: LmStudioSettings::default(),
            openai: OpenAiSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LmStudioSettings {
    pub base_url: String,
    /// LM Studio answers with whatever model is loaded; empty is accepted.
    pub model: String,
}

impl Default for LmStudioSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234".to_string(),
            model: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
        }
    }
}

impl AiConfig {
    /// The set of selectable providers: `enabled` plus the default and fallback.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        let mut kinds = self.enabled.clone();
        kinds.push(self.provider);
        kinds.extend(self.fallback_provider);
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.configured_providers().contains(&kind)
    }

    /// # Errors
    ///
    /// Returns `AiError::Validation` naming the offending `ai.*` key.
    pub fn validate(&self) -> Result<(), AiError> {
        if self.timeout_ms == 0 {
            return Err(AiError::validation("ai.timeout_ms", "must be greater than 0"));
        }
        if self.fallback_provider == Some(self.provider) {
            return Err(AiError::validation(
                "ai.fallback_provider",
                "must differ from ai.provider",
            ));
        }
        for (key, url) in [
            ("ai.ollama.base_url", &self.ollama.base_url),
            ("ai.lmstudio.base_url", &self.lmstudio.base_url),
            ("ai.openai.base_url", &self.openai.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AiError::validation(key, format!("'{url}' is not an http(s) URL")));
            }
        }
        if self.is_configured(ProviderKind::OpenAi)
            && self.send_to_cloud
            && self.openai.api_key.as_deref().is_none_or(str::is_empty)
        {
            return Err(AiError::validation(
                "ai.openai.api_key",
                "required when cloud sending is enabled",
            ));
        }
        Ok(())
    }
}
