use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::outcome::{IssueSeverity, OperationOutcome};
use crate::{FHIR_JSON, JSON};

/// A serialisable body with its status, media type and extra headers.
///
/// Defaults to `application/fhir+json`; REST handlers switch to plain JSON
/// with [`ApiResponse::as_json`].
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub body: T,
    pub status: StatusCode,
    pub media_type: &'static str,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(body: T, status: StatusCode) -> Self {
        Self {
            body,
            status,
            media_type: FHIR_JSON,
            headers: Vec::new(),
        }
    }

    pub fn ok(body: T) -> Self {
        Self::new(body, StatusCode::OK)
    }

    pub fn created(body: T) -> Self {
        Self::new(body, StatusCode::CREATED)
    }

    pub fn as_json(mut self) -> Self {
        self.media_type = JSON;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Sets `Location`; a value that is not a valid header is dropped.
    pub fn with_location(self, location: &str) -> Self {
        match HeaderValue::from_str(location) {
            Ok(value) => self.with_header(header::LOCATION, value),
            Err(_) => self,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        render(self.status, self.media_type, self.headers, &self.body)
    }
}

pub(crate) fn render<T: Serialize>(
    status: StatusCode,
    media_type: &'static str,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: &T,
) -> Response {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            let outcome = OperationOutcome::issue(
                IssueSeverity::Fatal,
                "exception",
                format!("response serialization failed: {e}"),
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::to_vec(&outcome).unwrap_or_default(),
            )
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    let map = response.headers_mut();
    map.insert(header::CONTENT_TYPE, HeaderValue::from_static(media_type));
    for (name, value) in headers {
        map.insert(name, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fhir_media_type_by_default() {
        let res = ApiResponse::ok(json!({"resourceType": "Patient"})).into_response();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], FHIR_JSON);
    }

    #[test]
    fn created_json_with_location() {
        let res = ApiResponse::created(json!({"id": 1}))
            .as_json()
            .with_location("/api/v1/patients/1")
            .into_response();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()[header::CONTENT_TYPE], JSON);
        assert_eq!(res.headers()[header::LOCATION], "/api/v1/patients/1");
    }

    #[test]
    fn invalid_location_is_skipped() {
        let res = ApiResponse::ok(json!({}))
            .with_location("bad\nvalue")
            .into_response();
        assert!(res.headers().get(header::LOCATION).is_none());
    }
}
