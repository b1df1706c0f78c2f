//! Consultation orchestration: provider selection, privacy policy, timeout,
//! retry and fallback.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bloodwork_core::RecordId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::AiConfig;
use crate::context::{ContextType, PatientRecords, build_context};
use crate::error::AiError;
use crate::provider::{AiProvider, Locality, ProviderKind};
use crate::providers::{LmStudioProvider, MockProvider, OllamaProvider, OpenAiProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultRequest {
    pub question: String,
    /// `mock`, `local`, `cloud` or a provider name. Unset means the configured default.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub context_type: ContextType,
    #[serde(default)]
    pub patient_id: Option<RecordId>,
}

impl ConsultRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            provider: None,
            context_type: ContextType::default(),
            patient_id: None,
        }
    }

    /// # Errors
    ///
    /// Returns `AiError::Validation` for an empty question or a missing patient.
    pub fn validate(&self) -> Result<(), AiError> {
        if self.question.trim().is_empty() {
            return Err(AiError::validation("question", "must not be empty"));
        }
        if self.context_type.needs_patient() && self.patient_id.is_none() {
            return Err(AiError::validation(
                "patient_id",
                format!("required for context type '{}'", self.context_type),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsultResponse {
    pub response: String,
    pub provider_used: ProviderKind,
    pub context_type: ContextType,
    #[serde(with = "bloodwork_core::time::serde_datetime")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub name: ProviderKind,
    pub display: &'static str,
    #[serde(rename = "type")]
    pub locality: Locality,
    pub default: bool,
}

/// Provider registry built once from an [`AiConfig`].
pub struct ConsultationService {
    config: AiConfig,
    providers: BTreeMap<ProviderKind, Arc<dyn AiProvider>>,
}

impl std::fmt::Debug for ConsultationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsultationService")
            .field("default", &self.config.provider)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConsultationService {
    pub fn new(config: AiConfig) -> Self {
        let timeout_ms = config.timeout_ms;
        let providers = config
            .configured_providers()
            .into_iter()
            .map(|kind| {
                let provider: Arc<dyn AiProvider> = match kind {
                    ProviderKind::Mock => Arc::new(MockProvider),
                    ProviderKind::Ollama => Arc::new(OllamaProvider::new(&config.ollama, timeout_ms)),
                    ProviderKind::LmStudio => {
                        Arc::new(LmStudioProvider::new(&config.lmstudio, timeout_ms))
                    }
                    ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(&config.openai, timeout_ms)),
                };
                (kind, provider)
            })
            .collect();
        Self { config, providers }
    }

    /// Replace the implementation registered for `provider.kind()`.
    pub fn with_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.providers
            .keys()
            .map(|kind| ProviderInfo {
                name: *kind,
                display: kind.display_name(),
                locality: kind.locality(),
                default: *kind == self.config.provider,
            })
            .collect()
    }

    /// Map a request's provider choice to a configured provider.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Validation` when the choice is unknown or not configured.
    pub fn resolve_provider(&self, choice: Option<&str>) -> Result<ProviderKind, AiError> {
        let configured = |kind: &ProviderKind| self.providers.contains_key(kind);
        let kind = match choice.map(str::trim) {
            None | Some("") => self.config.provider,
            Some("local") => {
                let default = self.config.provider;
                if default.locality() == Locality::Local && default != ProviderKind::Mock {
                    default
                } else {
                    [ProviderKind::Ollama, ProviderKind::LmStudio, ProviderKind::Mock]
                        .into_iter()
                        .find(configured)
                        .ok_or_else(|| {
                            AiError::validation("provider", "no local provider is configured")
                        })?
                }
            }
            Some("cloud") => ProviderKind::OpenAi,
            Some(name) => name.parse()?,
        };
        if !configured(&kind) {
            return Err(AiError::validation(
                "provider",
                format!("provider '{kind}' is not configured"),
            ));
        }
        Ok(kind)
    }

    /// # Errors
    ///
    /// Returns `AiError::Policy` for a cloud provider while cloud sending is disabled.
    pub fn check_policy(&self, kind: ProviderKind) -> Result<(), AiError> {
        if kind.is_cloud() && !self.config.send_to_cloud {
            return Err(AiError::Policy(format!(
                "sending data to cloud provider '{kind}' is disabled (ai.send_to_cloud = false)"
            )));
        }
        Ok(())
    }

    /// Validate a request and pick its provider without calling anything.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Validation` or `AiError::Policy`.
    pub fn prepare(&self, request: &ConsultRequest) -> Result<ProviderKind, AiError> {
        request.validate()?;
        let kind = self.resolve_provider(request.provider.as_deref())?;
        self.check_policy(kind)?;
        Ok(kind)
    }

    /// Run a consultation. `records` is the data of `request.patient_id`.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Validation` or `AiError::Policy` before any network
    /// call, otherwise `AiError::Provider` or `AiError::Timeout` from the
    /// selected provider (and from the fallback, when one is configured).
    pub async fn consult(
        &self,
        request: &ConsultRequest,
        records: Option<&PatientRecords>,
    ) -> Result<ConsultResponse, AiError> {
        let kind = self.prepare(request)?;
        let context = build_context(request.context_type, records);

        let result = match self.call(kind, &request.question, &context).await {
            Err(err) if err.is_provider_failure() => match self.fallback_for(kind) {
                Some(fallback) => {
                    tracing::warn!(
                        provider = %kind,
                        fallback = %fallback,
                        error = %err,
                        "provider failed, using fallback"
                    );
                    self.call(fallback, &request.question, &context)
                        .await
                        .map(|answer| (fallback, answer))
                }
                None => Err(err),
            },
            other => other.map(|answer| (kind, answer)),
        };
        let (provider_used, response) = result?;

        tracing::info!(
            provider = %provider_used,
            context_type = %request.context_type,
            patient_id = ?request.patient_id,
            "consultation answered"
        );
        Ok(ConsultResponse {
            response,
            provider_used,
            context_type: request.context_type,
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    fn fallback_for(&self, kind: ProviderKind) -> Option<ProviderKind> {
        self.config
            .fallback_provider
            .filter(|fb| *fb != kind && self.providers.contains_key(fb))
            .filter(|fb| self.check_policy(*fb).is_ok())
    }

    async fn call(&self, kind: ProviderKind, prompt: &str, context: &str) -> Result<String, AiError> {
        let provider = self.providers.get(&kind).ok_or_else(|| {
            AiError::validation("provider", format!("provider '{kind}' is not configured"))
        })?;
        match self.call_once(provider.as_ref(), prompt, context).await {
            Err(err) if err.is_transient() && self.config.retry_transient => {
                tracing::debug!(provider = %kind, error = %err, "retrying after transient failure");
                tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                self.call_once(provider.as_ref(), prompt, context).await
            }
            other => other,
        }
    }

    async fn call_once(
        &self,
        provider: &dyn AiProvider,
        prompt: &str,
        context: &str,
    ) -> Result<String, AiError> {
        let timeout_ms = self.config.timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), provider.ask(prompt, context))
            .await
            .map_err(|_| AiError::Timeout {
                provider: provider.kind().to_string(),
                timeout_ms,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OllamaSettings, OpenAiSettings};
    use crate::providers::MOCK_ANSWER;
    use bloodwork_core::{Observation, Patient};
    use time::macros::datetime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn records() -> PatientRecords {
        PatientRecords {
            patient: Patient::new("Jane Doe").with_id(1),
            observations: vec![
                Observation::new(1, "2339-0", 95.0, datetime!(2024-01-01 08:00:00 UTC)).with_id(1),
            ],
            reports: vec![],
        }
    }

    fn request(provider: &str) -> ConsultRequest {
        ConsultRequest {
            question: "Is my glucose normal?".into(),
            provider: Some(provider.into()),
            context_type: ContextType::TextSummary,
            patient_id: Some(1),
        }
    }

    fn ollama_at(uri: String) -> OllamaSettings {
        OllamaSettings {
            base_url: uri,
            model: "llama2".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_consultation() {
        let service = ConsultationService::new(AiConfig::default());
        let answer = service.consult(&request("mock"), Some(&records())).await.unwrap();
        assert_eq!(answer.response, MOCK_ANSWER);
        assert_eq!(answer.provider_used, ProviderKind::Mock);
    }

    #[test]
    fn test_request_validation() {
        let service = ConsultationService::new(AiConfig::default());
        let mut req = request("mock");
        req.question = "   ".into();
        assert!(matches!(service.prepare(&req), Err(AiError::Validation { field, .. }) if field == "question"));

        let mut req = request("mock");
        req.patient_id = None;
        assert!(matches!(service.prepare(&req), Err(AiError::Validation { field, .. }) if field == "patient_id"));

        req.context_type = ContextType::None;
        assert!(service.prepare(&req).is_ok());
    }

    #[test]
    fn test_resolve_provider() {
        let config = AiConfig {
            enabled: vec![ProviderKind::Mock, ProviderKind::LmStudio],
            ..AiConfig::default()
        };
        let service = ConsultationService::new(config);
        assert_eq!(service.resolve_provider(None).unwrap(), ProviderKind::Mock);
        assert_eq!(service.resolve_provider(Some("local")).unwrap(), ProviderKind::LmStudio);
        assert!(service.resolve_provider(Some("cloud")).is_err());
        assert!(service.resolve_provider(Some("ollama")).is_err());
        assert!(service.resolve_provider(Some("gemini")).is_err());
    }

    #[tokio::test]
    async fn test_cloud_disabled_is_policy_error_before_any_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = AiConfig {
            send_to_cloud: false,
            openai: OpenAiSettings {
                base_url: server.uri(),
                api_key: Some("sk-test".into()),
                model: "gpt-3.5-turbo".into(),
            },
            ..AiConfig::default()
        };
        let service = ConsultationService::new(config);
        let err = service
            .consult(&request("cloud"), Some(&records()))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Policy(_)));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "late"}))
                    .set_delay(Duration::from_millis(2_000)),
            )
            .mount(&server)
            .await;

        let config = AiConfig {
            timeout_ms: 100,
            ollama: ollama_at(server.uri()),
            ..AiConfig::default()
        };
        let service = ConsultationService::new(config);
        let err = service
            .consult(&request("ollama"), Some(&records()))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Timeout { timeout_ms: 100, .. }));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "second"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = AiConfig {
            retry_transient: true,
            retry_backoff_ms: 10,
            ollama: ollama_at(server.uri()),
            ..AiConfig::default()
        };
        let service = ConsultationService::new(config);
        let answer = service
            .consult(&request("ollama"), Some(&records()))
            .await
            .unwrap();
        assert_eq!(answer.response, "second");
    }

    #[tokio::test]
    async fn test_no_retry_without_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let config = AiConfig {
            ollama: ollama_at(server.uri()),
            ..AiConfig::default()
        };
        let service = ConsultationService::new(config);
        let err = service
            .consult(&request("ollama"), Some(&records()))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_fallback_only_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = AiConfig {
            provider: ProviderKind::Ollama,
            fallback_provider: Some(ProviderKind::Mock),
            ollama: ollama_at(server.uri()),
            ..AiConfig::default()
        };
        let service = ConsultationService::new(config);
        let answer = service
            .consult(&request("ollama"), Some(&records()))
            .await
            .unwrap();
        assert_eq!(answer.provider_used, ProviderKind::Mock);

        let config = AiConfig {
            provider: ProviderKind::Ollama,
            ollama: ollama_at(server.uri()),
            ..AiConfig::default()
        };
        let service = ConsultationService::new(config);
        let err = service
            .consult(&request("ollama"), Some(&records()))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Provider { .. }));
    }

    #[test]
    fn test_providers_listing() {
        let service = ConsultationService::new(AiConfig::default());
        let listed = service.providers();
        assert_eq!(listed.len(), 4);
        let openai = listed.iter().find(|p| p.name == ProviderKind::OpenAi).unwrap();
        assert_eq!(openai.locality, Locality::Cloud);
        assert!(listed.iter().find(|p| p.name == ProviderKind::Mock).unwrap().default);
    }
}
