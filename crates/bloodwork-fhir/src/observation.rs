use crate::error::MappingError;
use crate::json::{Element, expect_resource};
use crate::mapper::{
    codeable_concept, coding_code, datetime_at, parse_reference, reference_to, resource_id,
    title_case,
};
use crate::systems;
use crate::terminology;
use bloodwork_core::model::DEFAULT_OBSERVATION_CATEGORY;
use bloodwork_core::time::format_datetime;
use bloodwork_core::{Interpretation, Observation, ObservationStatus, RecordKind};
use serde_json::{Map, Value, json};

fn quantity(value: f64, unit: Option<&str>) -> Value {
    let mut q = Map::new();
    q.insert("value".into(), json!(value));
    if let Some(unit) = unit {
        q.insert("unit".into(), json!(unit));
        q.insert("system".into(), json!(systems::UCUM));
        q.insert("code".into(), json!(unit));
    }
    Value::Object(q)
}

pub fn observation_to_fhir(obs: &Observation) -> Value {
    let mut out = Map::new();
    out.insert("resourceType".into(), json!("Observation"));
    if let Some(id) = obs.id {
        out.insert("id".into(), json!(id.to_string()));
    }
    out.insert("status".into(), json!(obs.status.as_str()));
    out.insert(
        "category".into(),
        json!([codeable_concept(
            systems::OBSERVATION_CATEGORY,
            &obs.category,
            Some(&title_case(&obs.category)),
        )]),
    );

    let display = terminology::loinc_display(&obs.code);
    let mut code = codeable_concept(systems::LOINC, &obs.code, display);
    if let (Some(display), Some(map)) = (display, code.as_object_mut()) {
        map.insert("text".into(), json!(display));
    }
    out.insert("code".into(), code);

    out.insert(
        "subject".into(),
        json!({ "reference": reference_to(RecordKind::Patient, obs.patient_id) }),
    );
    out.insert(
        "effectiveDateTime".into(),
        json!(format_datetime(obs.effective_datetime)),
    );
    out.insert("valueQuantity".into(), quantity(obs.value, obs.unit.as_deref()));

    if let Some(interp) = obs.interpretation {
        out.insert(
            "interpretation".into(),
            json!([codeable_concept(
                systems::OBSERVATION_INTERPRETATION,
                interp.as_str(),
                Some(interp.display()),
            )]),
        );
    }

    if obs.ref_min.is_some() || obs.ref_max.is_some() {
        let mut range = Map::new();
        if let Some(low) = obs.ref_min {
            range.insert("low".into(), quantity(low, obs.unit.as_deref()));
        }
        if let Some(high) = obs.ref_max {
            range.insert("high".into(), quantity(high, obs.unit.as_deref()));
        }
        out.insert("referenceRange".into(), json!([Value::Object(range)]));
    }

    if let Some(performer) = &obs.performer {
        out.insert("performer".into(), json!([{ "display": performer }]));
    }
    if let Some(specimen) = &obs.specimen {
        out.insert("specimen".into(), json!({ "display": specimen }));
    }
    if let Some(method) = &obs.method {
        out.insert("method".into(), json!({ "text": method }));
    }
    if let Some(notes) = &obs.notes {
        out.insert("note".into(), json!([{ "text": notes }]));
    }
    Value::Object(out)
}

/// LOINC code from `code.coding`, skipping codings of other systems only when a LOINC one exists.
fn loinc_code<'a>(code: &Element<'a>) -> Result<&'a str, MappingError> {
    let codings = code.items("coding")?;
    if codings.is_empty() {
        return Err(MappingError::missing(code.child_path("coding[0].code")));
    }
    let mut first_foreign = None;
    for coding in &codings {
        match coding.opt_str("system")? {
            Some(systems::LOINC) => {
                let code = coding.require("code")?.as_str()?;
                if code.trim().is_empty() {
                    return Err(MappingError::missing(coding.child_path("code")));
                }
                return Ok(code);
            }
            Some(other) => {
                if first_foreign.is_none() {
                    first_foreign = Some((coding.child_path("system"), other.to_string()));
                }
            }
            None => {
                if first_foreign.is_none() {
                    first_foreign = Some((coding.child_path("system"), String::new()));
                }
            }
        }
    }
    let (path, found) = first_foreign.unwrap_or_default();
    Err(MappingError::InvalidSystem {
        path,
        expected: systems::LOINC,
        found,
    })
}

/// Decimal value and optional UCUM unit of a Quantity.
fn quantity_from(q: &Element<'_>) -> Result<(f64, Option<String>), MappingError> {
    let value = q.require("value")?.as_decimal()?;
    if let Some(system) = q.opt_str("system")? {
        if system != systems::UCUM {
            return Err(MappingError::InvalidSystem {
                path: q.child_path("system"),
                expected: systems::UCUM,
                found: system.to_string(),
            });
        }
    }
    let unit = match q.opt_str("unit")? {
        Some(unit) => Some(unit),
        None => q.opt_str("code")?,
    };
    Ok((value, unit.map(str::to_string)))
}

pub fn observation_from_fhir(resource: &Value) -> Result<Observation, MappingError> {
    let root = expect_resource(resource, "Observation")?;
    let id = resource_id(&root)?;

    let status = match root.opt_str("status")? {
        Some(raw) => raw
            .parse::<ObservationStatus>()
            .map_err(|_| MappingError::InvalidCode {
                path: "status".to_string(),
                value: raw.to_string(),
            })?,
        None => ObservationStatus::Unknown,
    };

    let category = match root.first("category")? {
        Some(concept) => coding_code(&concept, systems::OBSERVATION_CATEGORY)?,
        None => None,
    }
    .unwrap_or(DEFAULT_OBSERVATION_CATEGORY)
    .to_string();

    let code = loinc_code(&root.require("code")?)?.to_string();

    let subject = root.require("subject")?.require("reference")?;
    let patient_id = parse_reference(subject.as_str()?, "Patient", subject.path())?;

    let effective_datetime = datetime_at(&root.require("effectiveDateTime")?)?;

    let (value, unit) = quantity_from(&root.require("valueQuantity")?)?;

    let interpretation = match root.first("interpretation")? {
        Some(concept) => match coding_code(&concept, systems::OBSERVATION_INTERPRETATION)? {
            Some(raw) => Some(raw.parse::<Interpretation>().map_err(|_| {
                MappingError::InvalidCode {
                    path: concept.child_path("coding[0].code"),
                    value: raw.to_string(),
                }
            })?),
            None => None,
        },
        None => None,
    };

    let (mut ref_min, mut ref_max) = (None, None);
    if let Some(range) = root.first("referenceRange")? {
        if let Some(low) = range.get("low") {
            ref_min = low.opt_decimal("value")?;
        }
        if let Some(high) = range.get("high") {
            ref_max = high.opt_decimal("value")?;
        }
        if let (Some(min), Some(max)) = (ref_min, ref_max) {
            if min > max {
                return Err(MappingError::invalid_value(
                    range.path(),
                    format!("low ({min}) must not exceed high ({max})"),
                ));
            }
        }
    }

    let performer = match root.first("performer")? {
        Some(p) => p.opt_str("display")?.map(str::to_string),
        None => None,
    };
    let specimen = match root.get("specimen") {
        Some(s) => s.opt_str("display")?.map(str::to_string),
        None => None,
    };
    let method = match root.get("method") {
        Some(m) => m.opt_str("text")?.map(str::to_string),
        None => None,
    };
    let notes = match root.first("note")? {
        Some(n) => n.opt_str("text")?.map(str::to_string),
        None => None,
    };

    Ok(Observation {
        id,
        patient_id,
        code,
        value,
        unit,
        ref_min,
        ref_max,
        interpretation,
        effective_datetime,
        status,
        category,
        notes,
        performer,
        specimen,
        method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn glucose() -> Observation {
        Observation::new(1, "2339-0", 5.4, datetime!(2024-03-01 08:00:00 UTC))
            .with_id(7)
            .with_unit("mmol/L")
            .with_range(Some(3.9), Some(5.6))
            .with_interpretation(Interpretation::Normal)
    }

    #[test]
    fn test_table_fields_are_placed() {
        let fhir = observation_to_fhir(&glucose());
        assert_eq!(fhir["resourceType"], "Observation");
        assert_eq!(fhir["id"], "7");
        assert_eq!(fhir["status"], "final");
        assert_eq!(fhir["code"]["coding"][0]["system"], systems::LOINC);
        assert_eq!(fhir["code"]["coding"][0]["code"], "2339-0");
        assert_eq!(fhir["subject"]["reference"], "Patient/1");
        assert_eq!(fhir["effectiveDateTime"], "2024-03-01T08:00:00Z");
        assert_eq!(fhir["valueQuantity"]["value"], 5.4);
        assert_eq!(fhir["valueQuantity"]["unit"], "mmol/L");
        assert_eq!(fhir["valueQuantity"]["system"], systems::UCUM);
        assert_eq!(fhir["referenceRange"][0]["low"]["value"], 3.9);
        assert_eq!(fhir["referenceRange"][0]["high"]["value"], 5.6);
        assert_eq!(fhir["interpretation"][0]["coding"][0]["code"], "N");
        assert_eq!(fhir["interpretation"][0]["coding"][0]["display"], "Normal");
        assert_eq!(fhir["category"][0]["coding"][0]["code"], "laboratory");
    }

    #[test]
    fn test_round_trip() {
        let obs = glucose();
        assert_eq!(observation_from_fhir(&observation_to_fhir(&obs)).unwrap(), obs);

        let mut full = glucose();
        full.notes = Some("fasting".into());
        full.performer = Some("City Lab".into());
        full.specimen = Some("Venous blood".into());
        full.method = Some("Hexokinase".into());
        full.status = ObservationStatus::Amended;
        assert_eq!(observation_from_fhir(&observation_to_fhir(&full)).unwrap(), full);
    }

    #[test]
    fn test_missing_optionals_are_omitted() {
        let bare = Observation::new(2, "718-7", 13.1, datetime!(2024-01-01 00:00:00 UTC));
        let fhir = observation_to_fhir(&bare);
        for key in ["id", "interpretation", "referenceRange", "note", "performer", "specimen", "method"] {
            assert!(fhir.get(key).is_none(), "{key} should be omitted");
        }
        assert!(fhir["valueQuantity"].get("unit").is_none());
        assert_eq!(observation_from_fhir(&fhir).unwrap(), bare);
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let mut fhir = observation_to_fhir(&glucose());
        fhir["valueQuantity"]["value"] = json!("5.4");
        let err = observation_from_fhir(&fhir).unwrap_err();
        assert_eq!(
            err,
            MappingError::InvalidType {
                path: "valueQuantity.value".into(),
                expected: "decimal"
            }
        );
    }

    #[test]
    fn test_required_fields() {
        for (key, path) in [
            ("valueQuantity", "valueQuantity"),
            ("effectiveDateTime", "effectiveDateTime"),
            ("subject", "subject"),
            ("code", "code"),
        ] {
            let mut fhir = observation_to_fhir(&glucose());
            fhir.as_object_mut().unwrap().remove(key);
            let err = observation_from_fhir(&fhir).unwrap_err();
            assert_eq!(err, MappingError::missing(path));
        }
    }

    #[test]
    fn test_wrong_code_system() {
        let mut fhir = observation_to_fhir(&glucose());
        fhir["code"]["coding"][0]["system"] = json!("http://snomed.info/sct");
        let err = observation_from_fhir(&fhir).unwrap_err();
        assert_eq!(err.path(), "code.coding[0].system");
        assert!(matches!(err, MappingError::InvalidSystem { .. }));
    }

    #[test]
    fn test_loinc_coding_found_among_others() {
        let mut fhir = observation_to_fhir(&glucose());
        fhir["code"]["coding"] = json!([
            {"system": "http://local/biomarkers", "code": "glu"},
            {"system": "http://loinc.org", "code": "2339-0"}
        ]);
        assert_eq!(observation_from_fhir(&fhir).unwrap().code, "2339-0");
    }

    #[test]
    fn test_malformed_date_and_reference() {
        let mut fhir = observation_to_fhir(&glucose());
        fhir["effectiveDateTime"] = json!("March 1st");
        let err = observation_from_fhir(&fhir).unwrap_err();
        assert!(matches!(err, MappingError::InvalidDate { ref path, .. } if path == "effectiveDateTime"));

        let mut fhir = observation_to_fhir(&glucose());
        fhir["subject"]["reference"] = json!("Group/1");
        let err = observation_from_fhir(&fhir).unwrap_err();
        assert_eq!(err.path(), "subject.reference");
    }

    #[test]
    fn test_date_only_effective_is_midnight_utc() {
        let mut fhir = observation_to_fhir(&glucose());
        fhir["effectiveDateTime"] = json!("2024-03-01");
        let obs = observation_from_fhir(&fhir).unwrap();
        assert_eq!(obs.effective_datetime, datetime!(2024-03-01 00:00:00 UTC));
    }

    #[test]
    fn test_inverted_reference_range() {
        let mut fhir = observation_to_fhir(&glucose());
        fhir["referenceRange"][0]["low"]["value"] = json!(9.0);
        let err = observation_from_fhir(&fhir).unwrap_err();
        assert_eq!(err.path(), "referenceRange[0]");
    }

    #[test]
    fn test_unknown_interpretation_code() {
        let mut fhir = observation_to_fhir(&glucose());
        fhir["interpretation"][0]["coding"][0]["code"] = json!("Q");
        let err = observation_from_fhir(&fhir).unwrap_err();
        assert_eq!(err.path(), "interpretation[0].coding[0].code");
    }

    #[test]
    fn test_missing_status_reads_as_unknown() {
        let mut fhir = observation_to_fhir(&glucose());
        fhir.as_object_mut().unwrap().remove("status");
        assert_eq!(
            observation_from_fhir(&fhir).unwrap().status,
            ObservationStatus::Unknown
        );
    }
}
