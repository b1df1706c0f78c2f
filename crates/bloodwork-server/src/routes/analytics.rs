//! Trends, report comparisons and patient summaries.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use bloodwork_api::{ApiError, ApiResponse};
use bloodwork_core::time::now_utc;
use bloodwork_core::{RecordId, RecordKind, parse_record_id};
use serde::Deserialize;

use super::parse_path_id;
use crate::analytics::{self, Comparison, PatientSummary, Period, Trend};
use crate::server::AppState;

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/trends", get(trends))
        .route("/comparisons", get(comparisons))
        .route("/summary/{patient_id}", get(summary))
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsQuery {
    patient: Option<String>,
    /// LOINC code or catalogue display name
    #[serde(alias = "biomarker")]
    code: Option<String>,
    period: Option<String>,
    baseline: Option<String>,
}

fn required_id(field: &str, raw: Option<&str>) -> Result<RecordId, ApiError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::invalid(field, "is required"))?;
    parse_record_id(raw.trim_start_matches("Patient/"))
        .map_err(|_| ApiError::invalid(field, format!("'{raw}' is not a record id")))
}

async fn trends(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<ApiResponse<Trend>, ApiError> {
    let patient_id = required_id("patient", query.patient.as_deref())?;
    let raw_code = query
        .code
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::invalid("code", "is required"))?;
    let period: Period = query
        .period
        .as_deref()
        .unwrap_or("6m")
        .parse()
        .map_err(|msg: String| ApiError::invalid("period", msg))?;

    let records = state.records.patient_records(patient_id).await?;
    let code = analytics::resolve_analyte(raw_code)
        .ok_or_else(|| ApiError::not_found(format!("unknown analyte '{raw_code}'")))?;
    let trend = analytics::trend(&records, &code, period, now_utc());
    tracing::debug!(patient_id, %code, points = trend.data_points.len(), "trend");
    Ok(ApiResponse::ok(trend).as_json())
}

async fn comparisons(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<ApiResponse<Comparison>, ApiError> {
    let patient_id = required_id("patient", query.patient.as_deref())?;
    let baseline = match query.baseline.as_deref() {
        Some(raw) => Some(required_id("baseline", Some(raw))?),
        None => None,
    };
    let records = state.records.patient_records(patient_id).await?;
    let comparison = analytics::compare_reports(&records, baseline).ok_or_else(|| {
        ApiError::not_found(format!(
            "DiagnosticReport/{} not found for Patient/{patient_id}",
            baseline.unwrap_or_default()
        ))
    })?;
    Ok(ApiResponse::ok(comparison).as_json())
}

async fn summary(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<ApiResponse<PatientSummary>, ApiError> {
    let patient_id = parse_path_id(RecordKind::Patient, &patient_id)?;
    let records = state.records.patient_records(patient_id).await?;
    Ok(ApiResponse::ok(analytics::summarize(&records, now_utc().date())).as_json())
}
