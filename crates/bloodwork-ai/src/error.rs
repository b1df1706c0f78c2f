use thiserror::Error;

/// Errors raised while preparing or running a consultation.
#[derive(Debug, Error)]
pub enum AiError {
    /// The request itself is malformed.
    #[error("Invalid consultation request at '{field}': {message}")]
    Validation { field: String, message: String },

    /// The request would send data somewhere the configuration forbids.
    #[error("Policy violation: {0}")]
    Policy(String),

    /// The provider was unreachable or answered with an error.
    #[error("Provider '{provider}' failed: {message}")]
    Provider {
        provider: String,
        message: String,
        /// Worth one more attempt (connection failures, 502/503/504)
        transient: bool,
    },

    #[error("Provider '{provider}' did not answer within {timeout_ms} ms")]
    Timeout { provider: String, timeout_ms: u64 },
}

impl AiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { transient: true, .. })
    }

    /// Failures of the provider itself, as opposed to a rejected request.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Timeout { .. })
    }

    /// Map a reqwest failure for `provider`.
    pub(crate) fn from_reqwest(provider: &str, err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                provider: provider.to_string(),
                timeout_ms,
            };
        }
        let transient = err.is_connect()
            || err.is_request()
            || err
                .status()
                .is_some_and(|s| matches!(s.as_u16(), 502..=504));
        Self::Provider {
            provider: provider.to_string(),
            message: err.to_string(),
            transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(AiError::transient("ollama", "refused").is_transient());
        assert!(!AiError::provider("ollama", "bad json").is_transient());
        assert!(AiError::provider("ollama", "bad json").is_provider_failure());
        assert!(!AiError::Policy("cloud".into()).is_provider_failure());
        assert!(!AiError::validation("question", "empty").is_provider_failure());
    }

    #[test]
    fn test_messages() {
        let err = AiError::Timeout {
            provider: "openai".into(),
            timeout_ms: 500,
        };
        assert_eq!(
            err.to_string(),
            "Provider 'openai' did not answer within 500 ms"
        );
        assert_eq!(
            AiError::validation("patient_id", "required").to_string(),
            "Invalid consultation request at 'patient_id': required"
        );
    }
}
