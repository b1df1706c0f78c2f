//! Search parameter parsing and pagination shared by the FHIR and REST routes.

use bloodwork_api::ApiError;
use bloodwork_core::time::{end_of_day, parse_date, parse_datetime, start_of_day};
use bloodwork_core::{RecordKind, parse_record_id};
use bloodwork_fhir::systems;
use bloodwork_storage::RecordFilter;
use time::OffsetDateTime;
use url::form_urlencoded;

use crate::config::SearchSettings;

/// Which surface a query came from. REST accepts extra aliases and ignores
/// unknown parameters; FHIR rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Fhir,
    Rest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub filter: RecordFilter,
    /// 1-indexed
    pub page: usize,
    pub count: usize,
    /// Filter parameters re-encoded for paging links
    pub filter_query: String,
}

impl SearchQuery {
    /// Slice one page out of `items`. Pages past the end are empty.
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = (self.page - 1).saturating_mul(self.count);
        items.into_iter().skip(skip).take(self.count).collect()
    }

    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.count)
    }
}

fn supported_params(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Patient => &["name"],
        RecordKind::Observation => &["patient", "code", "date"],
        RecordKind::DiagnosticReport => &["patient", "date"],
    }
}

pub fn parse_search(
    raw: Option<&str>,
    kind: RecordKind,
    settings: &SearchSettings,
    surface: Surface,
) -> Result<SearchQuery, ApiError> {
    let mut filter = RecordFilter::new();
    let mut page = 1usize;
    let mut count = settings.default_count;
    let mut kept = form_urlencoded::Serializer::new(String::new());

    for (key, value) in form_urlencoded::parse(raw.unwrap_or("").as_bytes()) {
        let key = key.as_ref();
        let value = value.as_ref();
        let name = match (surface, key) {
            (Surface::Rest, "page") => "_page",
            (Surface::Rest, "per_page") => "_count",
            (Surface::Rest, "date_ge" | "date_le") => "date",
            (_, other) => other,
        };
        match name {
            "_count" => {
                count = parse_positive("_count", value)?.min(settings.max_count);
                continue;
            }
            "_page" => {
                page = parse_positive("_page", value)?;
                continue;
            }
            "_format" => continue,
            _ => {}
        }
        if !supported_params(kind).contains(&name) {
            if surface == Surface::Fhir {
                return Err(ApiError::invalid(
                    key,
                    format!("unsupported search parameter for {kind}"),
                ));
            }
            continue;
        }
        match name {
            "name" => filter.name = Some(value.to_string()),
            "patient" => filter.patient_id = Some(parse_patient_param(value)?),
            "code" => filter.code = Some(parse_code_param(value)?),
            "date" => {
                let prefixed = match key {
                    "date_ge" => format!("ge{value}"),
                    "date_le" => format!("le{value}"),
                    _ => value.to_string(),
                };
                apply_date_param(&mut filter, &prefixed)?;
            }
            _ => {}
        }
        kept.append_pair(key, value);
    }

    Ok(SearchQuery {
        filter,
        page,
        count,
        filter_query: kept.finish(),
    })
}

fn parse_positive(name: &str, value: &str) -> Result<usize, ApiError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ApiError::invalid(
            name,
            format!("must be a positive integer, got '{value}'"),
        )),
    }
}

/// `1` or `Patient/1`
pub fn parse_patient_param(value: &str) -> Result<u64, ApiError> {
    let id = value.strip_prefix("Patient/").unwrap_or(value);
    parse_record_id(id).map_err(|e| ApiError::invalid("patient", e.to_string()))
}

/// `2339-0` or `http://loinc.org|2339-0`
fn parse_code_param(value: &str) -> Result<String, ApiError> {
    let code = match value.split_once('|') {
        Some(("", code)) => code,
        Some((system, code)) if system == systems::LOINC => code,
        Some((system, _)) => {
            return Err(ApiError::invalid(
                "code",
                format!("unsupported code system '{system}', expected {}", systems::LOINC),
            ));
        }
        None => value,
    };
    if code.is_empty() {
        return Err(ApiError::invalid("code", "must not be empty"));
    }
    Ok(code.to_string())
}

/// `ge`/`le`/`eq` prefix followed by a date or dateTime. A bare value means `eq`.
fn apply_date_param(filter: &mut RecordFilter, value: &str) -> Result<(), ApiError> {
    let (prefix, raw) = if value.len() > 2 && value.as_bytes()[..2].iter().all(u8::is_ascii_alphabetic) {
        value.split_at(2)
    } else {
        ("eq", value)
    };
    let (lower, upper) = parse_date_bounds(raw)?;
    match prefix {
        "ge" => narrow_ge(filter, lower),
        "le" => narrow_le(filter, upper),
        "eq" => {
            narrow_ge(filter, lower);
            narrow_le(filter, upper);
        }
        other => {
            return Err(ApiError::invalid(
                "date",
                format!("unsupported date prefix '{other}', expected ge, le or eq"),
            ));
        }
    }
    Ok(())
}

/// A bare date covers the whole UTC day; a dateTime is a single instant.
fn parse_date_bounds(raw: &str) -> Result<(OffsetDateTime, OffsetDateTime), ApiError> {
    if raw.len() == 10 {
        let date = parse_date(raw).map_err(|e| ApiError::invalid("date", e.to_string()))?;
        return Ok((start_of_day(date), end_of_day(date)));
    }
    let at = parse_datetime(raw).map_err(|e| ApiError::invalid("date", e.to_string()))?;
    Ok((at, at))
}

fn narrow_ge(filter: &mut RecordFilter, at: OffsetDateTime) {
    filter.date_ge = Some(filter.date_ge.map_or(at, |cur| cur.max(at)));
}

fn narrow_le(filter: &mut RecordFilter, at: OffsetDateTime) {
    filter.date_le = Some(filter.date_le.map_or(at, |cur| cur.min(at)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn settings() -> SearchSettings {
        SearchSettings::default()
    }

    fn fhir(raw: &str, kind: RecordKind) -> Result<SearchQuery, ApiError> {
        parse_search(Some(raw), kind, &settings(), Surface::Fhir)
    }

    #[test]
    fn test_defaults() {
        let q = parse_search(None, RecordKind::Observation, &settings(), Surface::Fhir).unwrap();
        assert!(q.filter.is_empty());
        assert_eq!(q.page, 1);
        assert_eq!(q.count, 20);
        assert!(q.filter_query.is_empty());
    }

    #[test]
    fn test_observation_filters() {
        let q = fhir(
            "patient=Patient/1&code=http%3A%2F%2Floinc.org%7C2339-0&date=ge2024-01-01&date=le2024-01-31",
            RecordKind::Observation,
        )
        .unwrap();
        assert_eq!(q.filter.patient_id, Some(1));
        assert_eq!(q.filter.code.as_deref(), Some("2339-0"));
        assert_eq!(q.filter.date_ge, Some(datetime!(2024-01-01 00:00:00 UTC)));
        assert_eq!(
            q.filter.date_le,
            Some(datetime!(2024-01-31 23:59:59.999999999 UTC))
        );
        assert!(q.filter_query.contains("patient=Patient%2F1"));
    }

    #[test]
    fn test_bare_date_covers_the_day() {
        let q = fhir("date=2024-03-05", RecordKind::DiagnosticReport).unwrap();
        assert_eq!(q.filter.date_ge, Some(datetime!(2024-03-05 00:00:00 UTC)));
        assert_eq!(
            q.filter.date_le,
            Some(datetime!(2024-03-05 23:59:59.999999999 UTC))
        );
    }

    #[test]
    fn test_datetime_bound_is_exact() {
        let q = fhir("date=ge2024-03-05T10:30:00Z", RecordKind::Observation).unwrap();
        assert_eq!(q.filter.date_ge, Some(datetime!(2024-03-05 10:30:00 UTC)));
    }

    #[test]
    fn test_repeated_bounds_narrow() {
        let q = fhir("date=ge2024-01-01&date=ge2024-02-01", RecordKind::Observation).unwrap();
        assert_eq!(q.filter.date_ge, Some(datetime!(2024-02-01 00:00:00 UTC)));
    }

    #[test]
    fn test_rejections() {
        assert!(fhir("date=gt2024-01-01", RecordKind::Observation).is_err());
        assert!(fhir("date=ge2024-13-01", RecordKind::Observation).is_err());
        assert!(fhir("code=http%3A%2F%2Fsnomed.info%2Fsct%7C123", RecordKind::Observation).is_err());
        assert!(fhir("patient=abc", RecordKind::Observation).is_err());
        assert!(fhir("patient=0", RecordKind::Observation).is_err());
        assert!(fhir("code=2339-0", RecordKind::Patient).is_err());
        assert!(fhir("_count=0", RecordKind::Patient).is_err());
        assert!(fhir("_page=0", RecordKind::Patient).is_err());
        assert!(fhir("_page=x", RecordKind::Patient).is_err());
    }

    #[test]
    fn test_count_is_capped() {
        let q = fhir("_count=500&_page=3", RecordKind::Patient).unwrap();
        assert_eq!(q.count, 100);
        assert_eq!(q.page, 3);
    }

    #[test]
    fn test_rest_aliases_and_unknown_params() {
        let q = parse_search(
            Some("page=2&per_page=5&date_ge=2024-01-01&date_le=2024-01-02&sort=desc"),
            RecordKind::Observation,
            &settings(),
            Surface::Rest,
        )
        .unwrap();
        assert_eq!(q.page, 2);
        assert_eq!(q.count, 5);
        assert_eq!(q.filter.date_ge, Some(datetime!(2024-01-01 00:00:00 UTC)));
        assert_eq!(
            q.filter.date_le,
            Some(datetime!(2024-01-02 23:59:59.999999999 UTC))
        );
    }

    #[test]
    fn test_paginate_past_end_is_empty() {
        let q = fhir("_count=2&_page=3", RecordKind::Patient).unwrap();
        assert_eq!(q.paginate(vec![1, 2, 3, 4]), Vec::<i32>::new());
        let q = fhir("_count=2&_page=2", RecordKind::Patient).unwrap();
        assert_eq!(q.paginate(vec![1, 2, 3]), vec![3]);
        assert_eq!(q.total_pages(3), 2);
        assert_eq!(q.total_pages(0), 0);
    }
}
