//! Lookups in the built-in LOINC and UCUM catalogues.

use axum::{
    Router,
    extract::{Path, Query},
    routing::get,
};
use bloodwork_api::{ApiError, ApiResponse};
use bloodwork_fhir::terminology::{search_loinc, search_ucum};
use serde::Deserialize;
use serde_json::Value;

use crate::server::AppState;

pub fn code_routes() -> Router<AppState> {
    Router::new().route("/{system}", get(lookup))
}

#[derive(Debug, Default, Deserialize)]
struct CodeQuery {
    #[serde(default)]
    q: String,
}

async fn lookup(
    Path(system): Path<String>,
    Query(query): Query<CodeQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let matches = match system.as_str() {
        "loinc" => serde_json::to_value(search_loinc(&query.q)),
        "ucum" => serde_json::to_value(search_ucum(&query.q)),
        other => {
            return Err(ApiError::not_found(format!(
                "unknown code system '{other}', expected loinc or ucum"
            )));
        }
    }
    .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(ApiResponse::ok(matches).as_json())
}
