use crate::error::MappingError;
use crate::json::expect_resource;
use crate::mapper::resource_id;
use bloodwork_core::time::{format_date, parse_date};
use bloodwork_core::{Gender, Patient};
use serde_json::{Map, Value, json};

pub fn patient_to_fhir(patient: &Patient) -> Value {
    let mut out = Map::new();
    out.insert("resourceType".into(), json!("Patient"));
    if let Some(id) = patient.id {
        out.insert("id".into(), json!(id.to_string()));
    }
    out.insert("name".into(), json!([{ "text": patient.name }]));
    if let Some(birth_date) = patient.birth_date {
        out.insert("birthDate".into(), json!(format_date(birth_date)));
    }
    if let Some(gender) = patient.gender {
        out.insert("gender".into(), json!(gender.as_str()));
    }
    if let Some(notes) = &patient.notes {
        out.insert("note".into(), json!([{ "text": notes }]));
    }
    Value::Object(out)
}

pub fn patient_from_fhir(resource: &Value) -> Result<Patient, MappingError> {
    let root = expect_resource(resource, "Patient")?;
    let id = resource_id(&root)?;

    let name_el = root
        .first("name")?
        .ok_or_else(|| MappingError::missing("name[0].text"))?;
    let name = match name_el.opt_str("text")? {
        Some(text) => text.to_string(),
        None => {
            let mut parts = Vec::new();
            for given in name_el.items("given")? {
                parts.push(given.as_str()?);
            }
            if let Some(family) = name_el.opt_str("family")? {
                parts.push(family);
            }
            parts.join(" ").trim().to_string()
        }
    };
    if name.trim().is_empty() {
        return Err(MappingError::missing(name_el.child_path("text")));
    }

    let birth_date = match root.get("birthDate") {
        Some(el) => {
            let raw = el.as_str()?;
            Some(parse_date(raw).map_err(|_| MappingError::InvalidDate {
                path: el.path().to_string(),
                value: raw.to_string(),
            })?)
        }
        None => None,
    };

    let gender = match root.opt_str("gender")? {
        Some(raw) => Some(raw.parse::<Gender>().map_err(|_| MappingError::InvalidCode {
            path: "gender".to_string(),
            value: raw.to_string(),
        })?),
        None => None,
    };

    let notes = match root.first("note")? {
        Some(note) => note.opt_str("text")?.map(str::to_string),
        None => None,
    };

    Ok(Patient {
        id,
        name,
        birth_date,
        gender,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use time::macros::date;

    fn jane() -> Patient {
        Patient::new("Jane Doe")
            .with_id(1)
            .with_birth_date(date!(1980 - 01 - 01))
            .with_gender(Gender::Female)
    }

    #[test]
    fn test_jane_doe_maps_exactly() {
        let fhir = patient_to_fhir(&jane());
        assert_json_eq!(
            fhir,
            json!({
                "resourceType": "Patient",
                "id": "1",
                "name": [{"text": "Jane Doe"}],
                "birthDate": "1980-01-01",
                "gender": "female"
            })
        );
        assert_eq!(patient_from_fhir(&fhir).unwrap(), jane());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let fhir = patient_to_fhir(&Patient::new("Anon"));
        assert_json_eq!(fhir, json!({"resourceType": "Patient", "name": [{"text": "Anon"}]}));
    }

    #[test]
    fn test_notes_round_trip() {
        let mut p = jane();
        p.notes = Some("Fasting samples only".into());
        let fhir = patient_to_fhir(&p);
        assert_eq!(fhir["note"][0]["text"], "Fasting samples only");
        assert_eq!(patient_from_fhir(&fhir).unwrap(), p);
    }

    #[test]
    fn test_name_text_is_kept_verbatim() {
        let p = Patient::new("  Jane Doe ").with_id(1);
        assert_eq!(patient_from_fhir(&patient_to_fhir(&p)).unwrap(), p);

        let err = patient_from_fhir(&json!({"resourceType": "Patient", "name": [{"text": "   "}]}))
            .unwrap_err();
        assert_eq!(err.path(), "name[0].text");
    }

    #[test]
    fn test_name_falls_back_to_given_and_family() {
        let p = patient_from_fhir(&json!({
            "resourceType": "Patient",
            "name": [{"given": ["Jane", "Q"], "family": "Doe"}]
        }))
        .unwrap();
        assert_eq!(p.name, "Jane Q Doe");
        assert_eq!(p.id, None);
    }

    #[test]
    fn test_missing_name_reports_path() {
        let err = patient_from_fhir(&json!({"resourceType": "Patient"})).unwrap_err();
        assert_eq!(err, MappingError::missing("name[0].text"));

        let err = patient_from_fhir(&json!({"resourceType": "Patient", "name": [{}]})).unwrap_err();
        assert_eq!(err.path(), "name[0].text");
    }

    #[test]
    fn test_invalid_gender_and_birth_date() {
        let err = patient_from_fhir(&json!({
            "resourceType": "Patient",
            "name": [{"text": "X"}],
            "gender": "F"
        }))
        .unwrap_err();
        assert!(matches!(err, MappingError::InvalidCode { ref path, .. } if path == "gender"));

        let err = patient_from_fhir(&json!({
            "resourceType": "Patient",
            "name": [{"text": "X"}],
            "birthDate": "01/02/1980"
        }))
        .unwrap_err();
        assert!(matches!(err, MappingError::InvalidDate { ref path, .. } if path == "birthDate"));
    }

    #[test]
    fn test_non_numeric_id_rejected() {
        let err = patient_from_fhir(&json!({
            "resourceType": "Patient",
            "id": "abc",
            "name": [{"text": "X"}]
        }))
        .unwrap_err();
        assert_eq!(err.path(), "id");
    }
}
