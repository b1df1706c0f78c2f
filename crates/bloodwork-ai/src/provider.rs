//! Provider trait and provider kinds.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// Where a provider runs, and therefore where patient data ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locality {
    Local,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Mock,
    Ollama,
    #[serde(rename = "lmstudio")]
    LmStudio,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Mock,
        ProviderKind::Ollama,
        ProviderKind::LmStudio,
        ProviderKind::OpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mock => "mock",
            ProviderKind::Ollama => "ollama",
            ProviderKind::LmStudio => "lmstudio",
            ProviderKind::OpenAi => "openai",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Mock => "Mock provider (testing)",
            ProviderKind::Ollama => "Ollama (local)",
            ProviderKind::LmStudio => "LM Studio (local)",
            ProviderKind::OpenAi => "OpenAI (cloud)",
        }
    }

    pub fn locality(&self) -> Locality {
        match self {
            ProviderKind::OpenAi => Locality::Cloud,
            _ => Locality::Local,
        }
    }

    pub fn is_cloud(&self) -> bool {
        self.locality() == Locality::Cloud
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AiError::validation("provider", format!("unknown provider '{s}'")))
    }
}

/// A language model backend.
///
/// `context` is the rendered patient data and may be empty.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `AiError::Provider` when the backend is unreachable or answers
    /// with an error, and `AiError::Timeout` when the HTTP client gives up.
    async fn ask(&self, prompt: &str, context: &str) -> Result<String, AiError>;

    fn kind(&self) -> ProviderKind;
}

/// Instruction sent ahead of every question.
pub const SYSTEM_PROMPT: &str = "You are a helpful medical assistant that helps interpret \
laboratory test results. Give clear and accurate information based on the data provided. \
This information is for informational purposes only and does not replace professional \
medical advice.";

/// Question followed by the patient data, if any.
pub(crate) fn user_message(prompt: &str, context: &str) -> String {
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}\n\nPatient data:\n{context}")
    }
}
