use axum::{Router, body::Bytes, extract::State, routing::post};
use bloodwork_api::{ApiError, ApiResponse};

use super::parse_json;
use crate::auth::{AuthError, LoginRequest, LoginResponse};
use crate::server::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let Some(auth) = state.auth.as_deref() else {
        return Err(ApiError::not_found("authentication is disabled"));
    };
    let request: LoginRequest = serde_json::from_value(parse_json(&body)?)
        .map_err(|e| ApiError::bad_request(format!("invalid login request: {e}")))?;

    match auth.login(&request) {
        Ok(response) => {
            tracing::info!(user = %response.user, "login succeeded");
            Ok(ApiResponse::ok(response).as_json())
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!(user = %request.username, "login failed");
            Err(ApiError::unauthorized(AuthError::InvalidCredentials.to_string()))
        }
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}
