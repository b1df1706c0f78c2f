use crate::error::MappingError;
use crate::json::Element;
use crate::{observation, patient, report};
use bloodwork_core::{DomainRecord, RecordId, RecordKind, parse_record_id};
use serde_json::Value;
use time::OffsetDateTime;

/// FHIR resource JSON as produced and consumed by the mapper.
pub type FhirResource = Value;

/// Render any domain record as its FHIR resource.
pub fn to_fhir(record: &DomainRecord) -> FhirResource {
    match record {
        DomainRecord::Patient(p) => patient::patient_to_fhir(p),
        DomainRecord::Observation(o) => observation::observation_to_fhir(o),
        DomainRecord::DiagnosticReport(r) => report::report_to_fhir(r),
    }
}

/// Parse a FHIR resource into the matching domain record, dispatching on `resourceType`.
pub fn from_fhir(resource: &FhirResource) -> Result<DomainRecord, MappingError> {
    let root = Element::root(resource);
    let rt = root.require("resourceType")?.as_str()?;
    let kind: RecordKind = rt.parse().map_err(|_| MappingError::WrongResourceType {
        path: "resourceType".to_string(),
        expected: "Patient | Observation | DiagnosticReport".to_string(),
        found: rt.to_string(),
    })?;
    Ok(match kind {
        RecordKind::Patient => patient::patient_from_fhir(resource)?.into(),
        RecordKind::Observation => observation::observation_from_fhir(resource)?.into(),
        RecordKind::DiagnosticReport => report::report_from_fhir(resource)?.into(),
    })
}

/// Parse a `{Type}/{id}` reference. Absolute URLs ending in `Type/id` are accepted.
pub fn parse_reference(
    reference: &str,
    expected: &'static str,
    path: &str,
) -> Result<RecordId, MappingError> {
    let invalid = || MappingError::InvalidReference {
        path: path.to_string(),
        value: reference.to_string(),
        expected,
    };
    let mut segments = reference.rsplit('/');
    let id = segments.next().ok_or_else(invalid)?;
    let rt = segments.next().ok_or_else(invalid)?;
    if rt != expected {
        return Err(invalid());
    }
    parse_record_id(id).map_err(|_| invalid())
}

pub(crate) fn reference_to(kind: RecordKind, id: RecordId) -> String {
    format!("{kind}/{id}")
}

/// Optional logical id of the resource.
pub(crate) fn resource_id(root: &Element<'_>) -> Result<Option<RecordId>, MappingError> {
    match root.opt_str("id")? {
        Some(raw) => parse_record_id(raw)
            .map(Some)
            .map_err(|_| MappingError::invalid_value("id", format!("'{raw}' is not a record id"))),
        None => Ok(None),
    }
}

pub(crate) fn datetime_at(element: &Element<'_>) -> Result<OffsetDateTime, MappingError> {
    let raw = element.as_str()?;
    bloodwork_core::time::parse_datetime(raw).map_err(|_| MappingError::InvalidDate {
        path: element.path().to_string(),
        value: raw.to_string(),
    })
}

/// `{"coding":[{"system","code","display"}]}`
pub(crate) fn codeable_concept(system: &str, code: &str, display: Option<&str>) -> Value {
    let mut coding = serde_json::Map::new();
    coding.insert("system".into(), Value::from(system));
    coding.insert("code".into(), Value::from(code));
    if let Some(display) = display {
        coding.insert("display".into(), Value::from(display));
    }
    serde_json::json!({ "coding": [Value::Object(coding)] })
}

/// Code of the first coding in a CodeableConcept, checking the system when one is given.
pub(crate) fn coding_code<'a>(
    concept: &Element<'a>,
    system: &'static str,
) -> Result<Option<&'a str>, MappingError> {
    let Some(coding) = concept.first("coding")? else {
        return Ok(None);
    };
    if let Some(found) = coding.opt_str("system")? {
        if found != system {
            return Err(MappingError::InvalidSystem {
                path: coding.child_path("system"),
                expected: system,
                found: found.to_string(),
            });
        }
    }
    coding.opt_str("code")
}

pub(crate) fn title_case(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
