//! Conversion of library errors into [`ApiError`] at the HTTP edge.

use bloodwork_ai::AiError;
use bloodwork_api::ApiError;
use bloodwork_core::CoreError;
use bloodwork_fhir::MappingError;
use bloodwork_storage::StorageError;

/// Errors that render as an `OperationOutcome`.
pub trait IntoApiError {
    fn into_api_error(self) -> ApiError;
}

impl IntoApiError for ApiError {
    fn into_api_error(self) -> ApiError {
        self
    }
}

impl IntoApiError for CoreError {
    fn into_api_error(self) -> ApiError {
        match self {
            CoreError::Validation { path, message } => ApiError::invalid(path, message),
            CoreError::NotFound { kind, id } => ApiError::not_found(format!("{kind}/{id} not found")),
            CoreError::ProfileLimit { .. } | CoreError::InvalidDateTime(_) | CoreError::InvalidId(_) => {
                ApiError::bad_request(self.to_string())
            }
        }
    }
}

impl IntoApiError for MappingError {
    fn into_api_error(self) -> ApiError {
        ApiError::invalid(self.path().to_string(), self.to_string())
    }
}

impl IntoApiError for StorageError {
    fn into_api_error(self) -> ApiError {
        match self {
            StorageError::NotFound { kind, id } => ApiError::not_found(format!("{kind}/{id} not found")),
            StorageError::InvalidRecord { message } => ApiError::bad_request(message),
            other => {
                tracing::error!(error = %other, "storage failure");
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl IntoApiError for AiError {
    fn into_api_error(self) -> ApiError {
        match self {
            AiError::Validation { field, message } => ApiError::invalid(field, message),
            AiError::Policy(msg) => ApiError::forbidden(msg),
            AiError::Provider { .. } => ApiError::bad_gateway(self.to_string()),
            AiError::Timeout { .. } => ApiError::gateway_timeout(self.to_string()),
        }
    }
}

/// `?`-friendly conversion: `store.load(..).await.api()?`.
pub trait ApiResultExt<T> {
    fn api(self) -> Result<T, ApiError>;
}

impl<T, E: IntoApiError> ApiResultExt<T> for Result<T, E> {
    fn api(self) -> Result<T, ApiError> {
        self.map_err(IntoApiError::into_api_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                CoreError::validation("name", "required").into_api_error(),
                StatusCode::BAD_REQUEST,
            ),
            (
                CoreError::ProfileLimit { limit: 4 }.into_api_error(),
                StatusCode::BAD_REQUEST,
            ),
            (
                MappingError::missing("subject").into_api_error(),
                StatusCode::BAD_REQUEST,
            ),
            (
                StorageError::not_found("Patient", 9).into_api_error(),
                StatusCode::NOT_FOUND,
            ),
            (
                StorageError::internal("boom").into_api_error(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AiError::Policy("cloud".into()).into_api_error(),
                StatusCode::FORBIDDEN,
            ),
            (
                AiError::provider("ollama", "refused").into_api_error(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AiError::Timeout {
                    provider: "ollama".into(),
                    timeout_ms: 10,
                }
                .into_api_error(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn test_mapping_error_keeps_path() {
        let outcome = MappingError::missing("valueQuantity.value")
            .into_api_error()
            .to_operation_outcome();
        assert_eq!(outcome.issue[0].expression, vec!["valueQuantity.value"]);
        assert!(
            outcome.issue[0]
                .diagnostics
                .as_deref()
                .unwrap_or_default()
                .contains("valueQuantity.value")
        );
    }
}
