use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::FHIR_JSON;
use crate::outcome::{IssueSeverity, OperationOutcome};
use crate::response::render;

/// Every failure an endpoint can answer with.
///
/// Library errors are converted into one of these at the HTTP edge; the
/// response body is always an `OperationOutcome`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Validation failure pinned to an element path
    #[error("invalid value at '{path}': {message}")]
    Invalid { path: String, message: String },
    #[error("authentication required: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("upstream timeout: {0}")]
    GatewayTimeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn invalid(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(msg.into())
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::BadGateway(msg.into())
    }

    pub fn gateway_timeout(msg: impl Into<String>) -> Self {
        Self::GatewayTimeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status and FHIR `IssueType` code.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) | Self::Invalid { .. } => (StatusCode::BAD_REQUEST, "invalid"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "login"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not-found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Self::UnsupportedMediaType(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "not-supported"),
            Self::BadGateway(_) => (StatusCode::BAD_GATEWAY, "transient"),
            Self::GatewayTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "exception"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    pub fn to_operation_outcome(&self) -> OperationOutcome {
        let (_, code) = self.classify();
        match self {
            Self::Invalid { path, message } => {
                OperationOutcome::issue(IssueSeverity::Error, code, format!("{path}: {message}"))
                    .at(path.clone())
            }
            Self::Internal(msg) => OperationOutcome::issue(IssueSeverity::Fatal, code, msg),
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::UnsupportedMediaType(msg)
            | Self::BadGateway(msg)
            | Self::GatewayTimeout(msg) => OperationOutcome::issue(IssueSeverity::Error, code, msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        render(
            self.status_code(),
            FHIR_JSON,
            Vec::new(),
            &self.to_operation_outcome(),
        )
    }
}
