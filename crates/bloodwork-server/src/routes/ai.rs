use axum::{Router, body::Bytes, extract::State, routing::get};
use bloodwork_ai::{ConsultRequest, ConsultResponse, ContextType, ProviderInfo};
use bloodwork_api::{ApiError, ApiResponse};
use serde::Serialize;

use super::parse_json;
use crate::error::ApiResultExt;
use crate::server::AppState;

pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/consult", get(consult_options).post(consult))
        .route("/providers", get(list_providers))
}

#[derive(Debug, Serialize)]
struct ContextOption {
    name: ContextType,
    display: &'static str,
}

#[derive(Debug, Serialize)]
struct ConsultOptions {
    providers: Vec<ProviderInfo>,
    context_types: Vec<ContextOption>,
    send_to_cloud: bool,
}

async fn consult_options(State(state): State<AppState>) -> ApiResponse<ConsultOptions> {
    let context_types = ContextType::ALL
        .into_iter()
        .map(|c| ContextOption {
            name: c,
            display: c.display_name(),
        })
        .collect();
    ApiResponse::ok(ConsultOptions {
        providers: state.ai.providers(),
        context_types,
        send_to_cloud: state.ai.config().send_to_cloud,
    })
    .as_json()
}

async fn list_providers(State(state): State<AppState>) -> ApiResponse<Vec<ProviderInfo>> {
    ApiResponse::ok(state.ai.providers()).as_json()
}

/// Validation and the cloud policy are checked before any patient data is read.
async fn consult(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<ConsultResponse>, ApiError> {
    let request: ConsultRequest = serde_json::from_value(parse_json(&body)?)
        .map_err(|e| ApiError::bad_request(format!("invalid consultation request: {e}")))?;
    state.ai.prepare(&request).api()?;

    let records = match (request.context_type.needs_patient(), request.patient_id) {
        (true, Some(patient_id)) => Some(state.records.patient_records(patient_id).await?),
        _ => None,
    };
    let response = state.ai.consult(&request, records.as_ref()).await.api()?;
    Ok(ApiResponse::ok(response).as_json())
}
