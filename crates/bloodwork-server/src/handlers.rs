use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bloodwork_api::{ApiResponse, CapabilityStatement, ResourceCapability};
use bloodwork_core::time::{format_datetime, now_utc};
use serde::Serialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

#[derive(Serialize)]
pub struct ReadyResponse<'a> {
    status: &'a str,
    storage: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Bloodwork Tracker",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let storage = state.records.store().backend_name();
    (
        StatusCode::OK,
        Json(ReadyResponse {
            status: "ready",
            storage,
        }),
    )
}

const INSTANCE_INTERACTIONS: &[&str] = &[
    "read",
    "update",
    "patch",
    "delete",
    "create",
    "search-type",
];

pub async fn metadata() -> impl IntoResponse {
    ApiResponse::ok(capability_statement())
}

pub fn capability_statement() -> CapabilityStatement {
    let resources = vec![
        ResourceCapability::new("Patient")
            .with_interactions(INSTANCE_INTERACTIONS)
            .with_search_param("name", "string"),
        ResourceCapability::new("Observation")
            .with_interactions(INSTANCE_INTERACTIONS)
            .with_search_param("patient", "reference")
            .with_search_param("code", "token")
            .with_search_param("date", "date"),
        ResourceCapability::new("DiagnosticReport")
            .with_interactions(INSTANCE_INTERACTIONS)
            .with_search_param("patient", "reference")
            .with_search_param("date", "date"),
        ResourceCapability::new("Bundle").with_interactions(&["read", "create"]),
    ];
    CapabilityStatement::server(resources).with_date(format_datetime(now_utc()))
}
