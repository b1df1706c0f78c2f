use axum::extract::State;
use axum::response::IntoResponse;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, header},
    middleware::Next,
    response::Response,
};
use bloodwork_api::{ApiError, validate_accept, validate_content_type};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::server::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id stored in request extensions for logging.
#[derive(Debug, Clone)]
pub struct RequestId(pub HeaderValue);

// =============================================================================
// Authentication Middleware
// =============================================================================

/// Requires a valid bearer token on `/api/v1/*` and `/fhir/*` when auth is enabled.
///
/// Verified [`Claims`](crate::auth::Claims) are stored in request extensions.
/// Failures return 401 with an OperationOutcome.
pub async fn authentication(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(auth) = state.auth.as_deref() else {
        return next.run(req).await;
    };
    if should_skip_authentication(req.uri().path()) {
        return next.run(req).await;
    }

    let Some(auth_header) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    else {
        tracing::debug!(path = %req.uri().path(), "No Authorization header");
        return unauthorized_response("Authentication required");
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) if !t.is_empty() => t,
        _ => return unauthorized_response("Invalid Authorization header format"),
    };

    match auth.verify(token) {
        Ok(claims) => {
            tracing::debug!(subject = %claims.sub, "Token validated successfully");
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Token validation failed");
            match e {
                AuthError::TokenExpired => unauthorized_response("Token expired"),
                _ => unauthorized_response(&e.to_string()),
            }
        }
    }
}

fn should_skip_authentication(path: &str) -> bool {
    let protected = path.starts_with("/api/v1/") || path.starts_with("/fhir/");
    !protected || matches!(path, "/api/v1/auth/login" | "/fhir/metadata")
}

fn unauthorized_response(message: &str) -> Response {
    let mut res = ApiError::unauthorized(message).into_response();
    res.headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    res
}

// =============================================================================
// Other Middleware
// =============================================================================

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    let req_id_value = match req.headers().get(&header_name) {
        Some(v) => v.clone(),
        None => HeaderValue::from_str(&Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    };

    req.extensions_mut().insert(RequestId(req_id_value.clone()));

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

// Accept must allow JSON; bodies of POST/PUT/PATCH must be declared as JSON.
pub async fn content_negotiation(req: Request<Body>, next: Next) -> Response {
    if let Err(e) = validate_accept(req.headers()) {
        return e.into_response();
    }

    let needs_body_type = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH);
    if needs_body_type {
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            return ApiError::unsupported_media_type(
                "Content-Type must be application/fhir+json or application/json",
            )
            .into_response();
        }
        if let Err(e) = validate_content_type(req.headers()) {
            return e.into_response();
        }
    }

    next.run(req).await
}
