//! Domain JSON endpoints under `/api/v1`.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use bloodwork_api::{ApiError, ApiResponse};
use bloodwork_core::{DomainRecord, RecordKind};
use serde_json::{Map, Value};

use super::{parse_json, parse_path_id};
use crate::mapping::{IdPolicy, record_from_json, record_to_json};
use crate::patch::{PatchFormat, apply_patch};
use crate::search::{Surface, parse_search};
use crate::server::AppState;

/// A REST collection and the record kind it holds.
pub trait Collection: Send + Sync + 'static {
    const KIND: RecordKind;
    /// Path segment, also the list key in search responses
    const NAME: &'static str;
}

pub struct Patients;
pub struct Observations;
pub struct Reports;

impl Collection for Patients {
    const KIND: RecordKind = RecordKind::Patient;
    const NAME: &'static str = "patients";
}

impl Collection for Observations {
    const KIND: RecordKind = RecordKind::Observation;
    const NAME: &'static str = "observations";
}

impl Collection for Reports {
    const KIND: RecordKind = RecordKind::DiagnosticReport;
    const NAME: &'static str = "reports";
}

pub fn rest_routes() -> Router<AppState> {
    Router::new()
        .merge(collection_routes::<Patients>())
        .merge(collection_routes::<Observations>())
        .merge(collection_routes::<Reports>())
}

fn collection_routes<C: Collection>() -> Router<AppState> {
    Router::new()
        .route(&format!("/{}", C::NAME), get(list::<C>).post(create::<C>))
        .route(
            &format!("/{}/{{id}}", C::NAME),
            get(read::<C>)
                .put(update::<C>)
                .patch(patch_record::<C>)
                .delete(delete::<C>),
        )
}

fn json(record: &DomainRecord) -> ApiResponse<Value> {
    ApiResponse::ok(record_to_json(record)).as_json()
}

async fn list<C: Collection>(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<ApiResponse<Value>, ApiError> {
    let query = parse_search(raw.as_deref(), C::KIND, &state.config.search, Surface::Rest)?;
    let (total, page) = state.records.search(C::KIND, &query).await?;

    let mut body = Map::new();
    body.insert(
        C::NAME.to_string(),
        Value::Array(page.iter().map(record_to_json).collect()),
    );
    body.insert("total".into(), total.into());
    body.insert("pages".into(), query.total_pages(total).into());
    body.insert("current_page".into(), query.page.into());
    Ok(ApiResponse::ok(Value::Object(body)).as_json())
}

async fn create<C: Collection>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<Value>, ApiError> {
    let mut record = record_from_json(C::KIND, parse_json(&body)?, IdPolicy::Create)?;
    if let DomainRecord::Observation(obs) = &mut record {
        obs.derive_interpretation();
    }
    let saved = state.records.create(record).await?;
    let location = format!("/api/v1/{}/{}", C::NAME, saved.id().unwrap_or_default());
    Ok(ApiResponse::created(record_to_json(&saved))
        .as_json()
        .with_location(&location))
}

async fn read<C: Collection>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let record = state
        .records
        .get(C::KIND, parse_path_id(C::KIND, &id)?)
        .await?;
    Ok(json(&record))
}

async fn update<C: Collection>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_path_id(C::KIND, &id)?;
    let record = record_from_json(C::KIND, parse_json(&body)?, IdPolicy::Update { path_id: id })?;
    let saved = state.records.update(id, record).await?;
    Ok(json(&saved))
}

async fn patch_record<C: Collection>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_path_id(C::KIND, &id)?;
    let format = PatchFormat::from_headers(&headers);
    let saved = state
        .records
        .patch(C::KIND, id, |current| {
            let patched = apply_patch(format, &record_to_json(current), &body)?;
            record_from_json(C::KIND, patched, IdPolicy::Update { path_id: id })
        })
        .await?;
    Ok(json(&saved))
}

async fn delete<C: Collection>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .records
        .delete(C::KIND, parse_path_id(C::KIND, &id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
