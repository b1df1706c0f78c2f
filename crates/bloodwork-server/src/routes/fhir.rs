//! FHIR R4 endpoints. Every response body is regenerated from stored records.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use bloodwork_api::{ApiError, ApiResponse, Bundle, BundleEntry, SearchEntryMode, build_search_links};
use bloodwork_core::{DomainRecord, RecordKind};
use bloodwork_fhir::{FhirResource, parse_bundle, to_bundle, to_fhir};
use url::form_urlencoded;

use super::{parse_json, parse_path_id};
use crate::error::ApiResultExt;
use crate::handlers;
use crate::mapping::{IdPolicy, record_from_fhir};
use crate::patch::{PatchFormat, apply_patch};
use crate::search::{Surface, parse_patient_param, parse_search};
use crate::server::AppState;

pub fn fhir_routes() -> Router<AppState> {
    Router::new()
        .route("/metadata", get(handlers::metadata))
        .route("/Bundle", get(export_bundle).post(import_bundle))
        .route("/{resource_type}", get(search).post(create))
        .route(
            "/{resource_type}/{id}",
            get(read)
                .put(update)
                .patch(patch_resource)
                .delete(delete),
        )
}

fn parse_kind(resource_type: &str) -> Result<RecordKind, ApiError> {
    resource_type
        .parse()
        .map_err(|_| ApiError::not_found(format!("Resource type '{resource_type}' is not supported")))
}

fn location(record: &DomainRecord) -> String {
    match record.id() {
        Some(id) => format!("/fhir/{}/{id}", record.kind()),
        None => format!("/fhir/{}", record.kind()),
    }
}

async fn search(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<ApiResponse<Bundle>, ApiError> {
    let kind = parse_kind(&resource_type)?;
    let query = parse_search(raw.as_deref(), kind, &state.config.search, Surface::Fhir)?;
    let (total, page) = state.records.search(kind, &query).await?;

    let base = format!("{}/fhir/{kind}", state.config.base_url());
    let links = build_search_links(
        total,
        &base,
        query.page,
        query.count,
        Some(&query.filter_query),
    );
    let entries = page
        .iter()
        .map(|r| BundleEntry::from_resource(to_fhir(r)).with_search_mode(SearchEntryMode::Match))
        .collect();
    Ok(ApiResponse::ok(Bundle::searchset(total as u64, entries, links)))
}

async fn create(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<FhirResource>, ApiError> {
    let kind = parse_kind(&resource_type)?;
    let record = record_from_fhir(kind, &parse_json(&body)?, IdPolicy::Create)?;
    let saved = state.records.create(record).await?;
    Ok(ApiResponse::created(to_fhir(&saved)).with_location(&location(&saved)))
}

async fn read(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
) -> Result<ApiResponse<FhirResource>, ApiError> {
    let kind = parse_kind(&resource_type)?;
    let record = state.records.get(kind, parse_path_id(kind, &id)?).await?;
    Ok(ApiResponse::ok(to_fhir(&record)))
}

async fn update(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
    body: Bytes,
) -> Result<ApiResponse<FhirResource>, ApiError> {
    let kind = parse_kind(&resource_type)?;
    let id = parse_path_id(kind, &id)?;
    let record = record_from_fhir(kind, &parse_json(&body)?, IdPolicy::Update { path_id: id })?;
    let saved = state.records.update(id, record).await?;
    Ok(ApiResponse::ok(to_fhir(&saved)))
}

async fn patch_resource(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<FhirResource>, ApiError> {
    let kind = parse_kind(&resource_type)?;
    let id = parse_path_id(kind, &id)?;
    let format = PatchFormat::from_headers(&headers);
    let saved = state
        .records
        .patch(kind, id, |current| {
            let patched = apply_patch(format, &to_fhir(current), &body)?;
            record_from_fhir(kind, &patched, IdPolicy::Update { path_id: id })
        })
        .await?;
    Ok(ApiResponse::ok(to_fhir(&saved)))
}

async fn delete(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&resource_type)?;
    state.records.delete(kind, parse_path_id(kind, &id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /fhir/Bundle?patient={id}`: the patient's `collection` Bundle.
async fn export_bundle(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<ApiResponse<Bundle>, ApiError> {
    let patient = form_urlencoded::parse(raw.as_deref().unwrap_or("").as_bytes())
        .find(|(k, _)| k == "patient")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| ApiError::invalid("patient", "is required"))?;
    let records = state
        .records
        .patient_records(parse_patient_param(&patient)?)
        .await?;
    Ok(ApiResponse::ok(to_bundle(
        &records.patient,
        &records.observations,
        &records.reports,
    )))
}

/// `POST /fhir/Bundle`: import every entry and answer with what was stored.
async fn import_bundle(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<Bundle>, ApiError> {
    let records = parse_bundle(&parse_json(&body)?).api()?;
    let stored = state.records.import_bundle(records).await?;
    let entries = stored
        .iter()
        .map(|r| BundleEntry::from_resource(to_fhir(r)))
        .collect();
    Ok(ApiResponse::created(Bundle::collection(entries)))
}
