use bloodwork_api::ApiError;
use bloodwork_core::{DiagnosticReport, DomainRecord, Observation, Patient, RecordId, RecordKind};
use serde_json::Value;

use crate::error::ApiResultExt;

/// ID handling policy for mapping an incoming body into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Create: body `id` is ignored; the store assigns one.
    Create,
    /// Update: URL id is authoritative; if body `id` is present, it must match.
    Update { path_id: RecordId },
}

impl IdPolicy {
    fn apply(self, mut record: DomainRecord) -> Result<DomainRecord, ApiError> {
        if let IdPolicy::Update { path_id } = self {
            if let Some(body_id) = record.id()
                && body_id != path_id
            {
                return Err(ApiError::invalid(
                    "id",
                    format!("id in body '{body_id}' does not match URL id '{path_id}'"),
                ));
            }
            record.set_id(path_id);
        }
        Ok(record)
    }
}

/// Parse a FHIR resource posted to `/fhir/{kind}`.
pub fn record_from_fhir(
    kind: RecordKind,
    body: &Value,
    policy: IdPolicy,
) -> Result<DomainRecord, ApiError> {
    if !body.is_object() {
        return Err(ApiError::bad_request("body must be a JSON object"));
    }
    if let Some(rt) = body.get("resourceType").and_then(Value::as_str)
        && rt != kind.as_str()
    {
        return Err(ApiError::invalid(
            "resourceType",
            format!("resourceType '{rt}' does not match path type '{kind}'"),
        ));
    }
    let record = bloodwork_fhir::from_fhir(body).api()?;
    policy.apply(record)
}

/// Parse a domain JSON body posted to the REST API.
pub fn record_from_json(
    kind: RecordKind,
    body: Value,
    policy: IdPolicy,
) -> Result<DomainRecord, ApiError> {
    if !body.is_object() {
        return Err(ApiError::bad_request("body must be a JSON object"));
    }
    let invalid = |e: serde_json::Error| ApiError::bad_request(format!("invalid {kind} body: {e}"));
    let record: DomainRecord = match kind {
        RecordKind::Patient => serde_json::from_value::<Patient>(body).map_err(invalid)?.into(),
        RecordKind::Observation => serde_json::from_value::<Observation>(body)
            .map_err(invalid)?
            .into(),
        RecordKind::DiagnosticReport => serde_json::from_value::<DiagnosticReport>(body)
            .map_err(invalid)?
            .into(),
    };
    policy.apply(record)
}

/// Domain JSON for a record, as returned by the REST API.
pub fn record_to_json(record: &DomainRecord) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fhir_create_keeps_body_for_service() {
        let body = json!({
            "resourceType": "Patient",
            "name": [{"text": "Jane Doe"}],
        });
        let record = record_from_fhir(RecordKind::Patient, &body, IdPolicy::Create).unwrap();
        assert_eq!(record.kind(), RecordKind::Patient);
        assert_eq!(record.id(), None);
    }

    #[test]
    fn update_uses_path_id_and_validates_body_id() {
        let body = json!({
            "resourceType": "Patient",
            "id": "3",
            "name": [{"text": "Jane Doe"}],
        });
        let err = record_from_fhir(RecordKind::Patient, &body, IdPolicy::Update { path_id: 4 })
            .unwrap_err();
        assert!(matches!(err, ApiError::Invalid { ref path, .. } if path == "id"));

        let record =
            record_from_fhir(RecordKind::Patient, &body, IdPolicy::Update { path_id: 3 }).unwrap();
        assert_eq!(record.id(), Some(3));

        let no_id = json!({"resourceType": "Patient", "name": [{"text": "A"}]});
        let record =
            record_from_fhir(RecordKind::Patient, &no_id, IdPolicy::Update { path_id: 9 })
                .unwrap();
        assert_eq!(record.id(), Some(9));
    }

    #[test]
    fn wrong_resource_type_is_rejected() {
        let body = json!({"resourceType": "Observation"});
        let err = record_from_fhir(RecordKind::Patient, &body, IdPolicy::Create).unwrap_err();
        assert!(matches!(err, ApiError::Invalid { ref path, .. } if path == "resourceType"));
    }

    #[test]
    fn mapping_errors_keep_their_path() {
        let body = json!({
            "resourceType": "Observation",
            "status": "final",
            "code": {"coding": [{"system": "http://loinc.org", "code": "2339-0"}]},
            "subject": {"reference": "Patient/1"},
            "effectiveDateTime": "2024-01-01T08:00:00Z",
            "valueQuantity": {"value": "high"}
        });
        let err = record_from_fhir(RecordKind::Observation, &body, IdPolicy::Create).unwrap_err();
        assert!(
            matches!(err, ApiError::Invalid { ref path, .. } if path == "valueQuantity.value")
        );
    }

    #[test]
    fn rest_body_round_trip() {
        let body = json!({
            "patient_id": 1,
            "code": "2339-0",
            "value": 95.5,
            "unit": "mg/dL",
            "effective_datetime": "2024-01-01T08:00:00Z"
        });
        let record = record_from_json(RecordKind::Observation, body, IdPolicy::Create).unwrap();
        let out = record_to_json(&record);
        assert_eq!(out["code"], "2339-0");
        assert_eq!(out["status"], "final");
        assert_eq!(out["category"], "laboratory");

        let err = record_from_json(RecordKind::Patient, json!({"gender": "female"}), IdPolicy::Create)
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(record_from_json(RecordKind::Patient, json!([]), IdPolicy::Create).is_err());
    }
}
