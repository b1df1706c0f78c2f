use crate::error::MappingError;
use crate::json::expect_resource;
use crate::mapper::from_fhir;
use crate::{observation_to_fhir, patient_to_fhir, report_to_fhir};
use bloodwork_api::{Bundle, BundleEntry};
use bloodwork_core::{DiagnosticReport, DomainRecord, Observation, Patient, RecordKind};
use serde_json::Value;

/// Package a patient with its observations and reports as a `collection` Bundle.
///
/// The Patient entry comes first. The remaining entries are ordered by
/// `effective_datetime` ascending, then id ascending, then Observation before
/// DiagnosticReport.
pub fn to_bundle(
    patient: &Patient,
    observations: &[Observation],
    reports: &[DiagnosticReport],
) -> Bundle {
    let mut clinical: Vec<(_, _, RecordKind, Value)> = observations
        .iter()
        .map(|o| {
            (
                o.effective_datetime,
                o.id,
                RecordKind::Observation,
                observation_to_fhir(o),
            )
        })
        .chain(reports.iter().map(|r| {
            (
                r.effective_datetime,
                r.id,
                RecordKind::DiagnosticReport,
                report_to_fhir(r),
            )
        }))
        .collect();
    clinical.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

    let mut entries = Vec::with_capacity(clinical.len() + 1);
    entries.push(BundleEntry::from_resource(patient_to_fhir(patient)));
    entries.extend(
        clinical
            .into_iter()
            .map(|(_, _, _, resource)| BundleEntry::from_resource(resource)),
    );
    tracing::debug!(
        patient_id = ?patient.id,
        entries = entries.len(),
        "assembled patient bundle"
    );
    Bundle::collection(entries)
}

/// Parse every entry of a Bundle into domain records, in entry order.
pub fn parse_bundle(bundle: &Value) -> Result<Vec<DomainRecord>, MappingError> {
    let root = expect_resource(bundle, "Bundle")?;
    let mut records = Vec::new();
    for entry in root.items("entry")? {
        let resource = entry.require("resource")?;
        let record = from_fhir(resource.value()).map_err(|e| e.with_prefix(resource.path()))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodwork_api::BundleType;
    use bloodwork_core::Gender;
    use serde_json::json;
    use time::macros::{date, datetime};

    fn patient() -> Patient {
        Patient::new("Jane Doe")
            .with_id(1)
            .with_birth_date(date!(1980 - 01 - 01))
            .with_gender(Gender::Female)
    }

    fn obs(id: u64, at: time::OffsetDateTime) -> Observation {
        Observation::new(1, "2339-0", 5.0, at).with_id(id)
    }

    #[test]
    fn test_patient_first_then_chronological() {
        let t1 = datetime!(2024-01-01 08:00:00 UTC);
        let t2 = datetime!(2024-02-01 08:00:00 UTC);
        let t3 = datetime!(2024-03-01 08:00:00 UTC);
        let observations = vec![obs(5, t3), obs(2, t1), obs(4, t2), obs(3, t2)];
        let reports = vec![DiagnosticReport::new(1, t1).with_id(9)];

        let bundle = to_bundle(&patient(), &observations, &reports);
        assert_eq!(bundle.bundle_type, BundleType::Collection);
        let urls: Vec<_> = bundle
            .entry
            .iter()
            .map(|e| e.full_url.clone().unwrap())
            .collect();
        assert_eq!(
            urls,
            vec![
                "Patient/1",
                "Observation/2",
                "DiagnosticReport/9",
                "Observation/3",
                "Observation/4",
                "Observation/5",
            ]
        );
    }

    #[test]
    fn test_same_id_and_time_puts_observation_first() {
        let t = datetime!(2024-01-01 08:00:00 UTC);
        let bundle = to_bundle(
            &patient(),
            &[obs(4, t)],
            &[DiagnosticReport::new(1, t).with_id(4)],
        );
        assert_eq!(bundle.entry[1].full_url.as_deref(), Some("Observation/4"));
        assert_eq!(bundle.entry[2].full_url.as_deref(), Some("DiagnosticReport/4"));
    }

    #[test]
    fn test_effective_times_non_decreasing() {
        let observations: Vec<_> = (1..=20u64)
            .map(|i| {
                let day = ((i * 7) % 28 + 1) as u8;
                let at = time::Date::from_calendar_date(2024, time::Month::May, day)
                    .unwrap()
                    .midnight()
                    .assume_utc();
                obs(i, at)
            })
            .collect();
        let bundle = to_bundle(&patient(), &observations, &[]);
        let times: Vec<_> = bundle.entry[1..]
            .iter()
            .map(|e| {
                bloodwork_core::time::parse_datetime(
                    e.resource.as_ref().unwrap()["effectiveDateTime"].as_str().unwrap(),
                )
                .unwrap()
            })
            .collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_parse_bundle_round_trip() {
        let t = datetime!(2024-01-01 08:00:00 UTC);
        let bundle = to_bundle(&patient(), &[obs(2, t)], &[]);
        let records = parse_bundle(&serde_json::to_value(&bundle).unwrap()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], DomainRecord::Patient(patient()));
        assert_eq!(records[1], DomainRecord::Observation(obs(2, t)));
    }

    #[test]
    fn test_parse_bundle_prefixes_error_path() {
        let value = json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {"resource": {"resourceType": "Patient", "name": [{"text": "A"}]}},
                {"resource": {"resourceType": "Patient", "gender": "x", "name": [{"text": "B"}]}}
            ]
        });
        let err = parse_bundle(&value).unwrap_err();
        assert_eq!(err.path(), "entry[1].resource.gender");
    }

    #[test]
    fn test_parse_bundle_rejects_unknown_resource() {
        let value = json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"resourceType": "Medication"}}]
        });
        let err = parse_bundle(&value).unwrap_err();
        assert_eq!(err.path(), "entry[0].resource.resourceType");
    }
}
