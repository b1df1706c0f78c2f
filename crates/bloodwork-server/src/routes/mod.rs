//! HTTP routes.
//!
//! - `fhir` - FHIR R4 CRUD, search and Bundle import/export under `/fhir`
//! - `rest` - domain JSON CRUD under `/api/v1/{patients,observations,reports}`
//! - `ai` - AI consultation under `/api/v1/ai`
//! - `codes` - LOINC/UCUM lookups under `/api/v1/codes`
//! - `analytics` - trends, comparisons and summaries under `/api/v1/analytics`
//! - `auth` - admin login under `/api/v1/auth`

pub mod ai;
pub mod analytics;
pub mod auth;
pub mod codes;
pub mod fhir;
pub mod rest;

use axum::body::Bytes;
use bloodwork_api::ApiError;
use bloodwork_core::{RecordId, RecordKind, parse_record_id};
use serde_json::Value;

/// Parse a request body as JSON, reporting failures as OperationOutcomes.
pub(crate) fn parse_json(body: &Bytes) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is empty"));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON: {e}")))
}

/// Ids that cannot name a record are reported as missing records.
pub(crate) fn parse_path_id(kind: RecordKind, raw: &str) -> Result<RecordId, ApiError> {
    parse_record_id(raw).map_err(|_| ApiError::not_found(format!("{kind}/{raw} not found")))
}
