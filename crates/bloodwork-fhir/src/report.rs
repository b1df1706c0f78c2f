use crate::error::MappingError;
use crate::json::expect_resource;
use crate::mapper::{
    codeable_concept, coding_code, datetime_at, parse_reference, reference_to, resource_id,
    title_case,
};
use crate::systems;
use bloodwork_core::model::DEFAULT_REPORT_CATEGORY;
use bloodwork_core::time::format_datetime;
use bloodwork_core::{DiagnosticReport, RecordKind, ReportStatus};
use serde_json::{Map, Value, json};

pub fn report_to_fhir(report: &DiagnosticReport) -> Value {
    let mut out = Map::new();
    out.insert("resourceType".into(), json!("DiagnosticReport"));
    if let Some(id) = report.id {
        out.insert("id".into(), json!(id.to_string()));
    }
    out.insert("status".into(), json!(report.status.as_str()));
    out.insert(
        "category".into(),
        json!([codeable_concept(
            systems::DIAGNOSTIC_SERVICE_SECTION,
            &report.category,
            Some(&title_case(&report.category)),
        )]),
    );
    let mut code = codeable_concept(
        systems::LOINC,
        systems::LAB_STUDIES_CODE,
        Some(systems::LAB_STUDIES_DISPLAY),
    );
    if let Some(map) = code.as_object_mut() {
        map.insert("text".into(), json!("Laboratory Results"));
    }
    out.insert("code".into(), code);
    out.insert(
        "subject".into(),
        json!({ "reference": reference_to(RecordKind::Patient, report.patient_id) }),
    );
    out.insert(
        "effectiveDateTime".into(),
        json!(format_datetime(report.effective_datetime)),
    );
    if let Some(issued) = report.issued {
        out.insert("issued".into(), json!(format_datetime(issued)));
    }
    if !report.result.is_empty() {
        let refs: Vec<Value> = report
            .result
            .iter()
            .map(|id| json!({ "reference": reference_to(RecordKind::Observation, *id) }))
            .collect();
        out.insert("result".into(), Value::Array(refs));
    }
    if let Some(conclusion) = &report.conclusion {
        out.insert("conclusion".into(), json!(conclusion));
    }
    if let Some(code) = &report.conclusion_code {
        out.insert(
            "conclusionCode".into(),
            json!([codeable_concept(systems::SNOMED, code, None)]),
        );
    }
    Value::Object(out)
}

pub fn report_from_fhir(resource: &Value) -> Result<DiagnosticReport, MappingError> {
    let root = expect_resource(resource, "DiagnosticReport")?;
    let id = resource_id(&root)?;

    let status = match root.opt_str("status")? {
        Some(raw) => raw
            .parse::<ReportStatus>()
            .map_err(|_| MappingError::InvalidCode {
                path: "status".to_string(),
                value: raw.to_string(),
            })?,
        None => ReportStatus::Unknown,
    };

    let category = match root.first("category")? {
        Some(concept) => coding_code(&concept, systems::DIAGNOSTIC_SERVICE_SECTION)?,
        None => None,
    }
    .unwrap_or(DEFAULT_REPORT_CATEGORY)
    .to_string();

    let subject = root.require("subject")?.require("reference")?;
    let patient_id = parse_reference(subject.as_str()?, "Patient", subject.path())?;

    let effective_datetime = datetime_at(&root.require("effectiveDateTime")?)?;
    let issued = root.get("issued").map(|el| datetime_at(&el)).transpose()?;

    let mut result = Vec::new();
    for item in root.items("result")? {
        let reference = item.require("reference")?;
        result.push(parse_reference(
            reference.as_str()?,
            "Observation",
            reference.path(),
        )?);
    }

    let conclusion = root.opt_str("conclusion")?.map(str::to_string);
    let conclusion_code = match root.first("conclusionCode")? {
        Some(concept) => coding_code(&concept, systems::SNOMED)?.map(str::to_string),
        None => None,
    };

    let report = DiagnosticReport {
        id,
        patient_id,
        status,
        effective_datetime,
        issued,
        conclusion,
        conclusion_code,
        category,
        result,
    };
    report.validate().map_err(|e| {
        MappingError::invalid_value(
            e.path().unwrap_or("result").to_string(),
            e.to_string(),
        )
    })?;
    Ok(report)
}
