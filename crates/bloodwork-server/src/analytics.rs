//! Read-only views over a patient's results: the series of one analyte over
//! time, value changes between reports, and an overall summary.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use bloodwork_ai::PatientRecords;
use bloodwork_core::time::{format_date, format_datetime};
use bloodwork_core::{DiagnosticReport, Interpretation, Observation, RecordId};
use bloodwork_fhir::terminology::{COMMON_LOINC, loinc_display, validate_loinc};
use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};

/// Reports compared against an explicit baseline.
const MAX_COMPARED_REPORTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Period {
    #[serde(rename = "1m")]
    Month,
    #[serde(rename = "3m")]
    Quarter,
    #[serde(rename = "6m")]
    HalfYear,
    #[serde(rename = "1y")]
    Year,
    #[serde(rename = "all")]
    All,
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::Month),
            "3m" => Ok(Self::Quarter),
            "6m" => Ok(Self::HalfYear),
            "1y" => Ok(Self::Year),
            "all" => Ok(Self::All),
            other => Err(format!("unknown period '{other}', expected 1m, 3m, 6m, 1y or all")),
        }
    }
}

impl Period {
    /// Earliest instant inside the window ending at `now`.
    fn start(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let days = match self {
            Self::Month => 30,
            Self::Quarter => 90,
            Self::HalfYear => 180,
            Self::Year => 365,
            Self::All => return None,
        };
        Some(now - Duration::days(days))
    }
}

/// A LOINC code as given, or the code of the catalogue entry whose display
/// name matches case-insensitively.
pub fn resolve_analyte(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if validate_loinc(raw).is_ok() {
        return Some(raw.to_string());
    }
    COMMON_LOINC
        .iter()
        .find(|c| c.display.eq_ignore_ascii_case(raw))
        .map(|c| c.code.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub observation_id: Option<RecordId>,
    pub date: String,
    pub value: f64,
    pub unit: Option<String>,
    pub ref_min: Option<f64>,
    pub ref_max: Option<f64>,
    pub interpretation: Option<Interpretation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub patient_id: Option<RecordId>,
    pub code: String,
    pub display: Option<&'static str>,
    pub unit: Option<String>,
    pub period: Period,
    pub data_points: Vec<TrendPoint>,
}

/// Observations of `code` inside `period`, oldest first.
pub fn trend(records: &PatientRecords, code: &str, period: Period, now: OffsetDateTime) -> Trend {
    let start = period.start(now);
    let mut series: Vec<&Observation> = records
        .observations
        .iter()
        .filter(|o| o.code == code)
        .filter(|o| start.is_none_or(|s| o.effective_datetime >= s) && o.effective_datetime <= now)
        .collect();
    series.sort_by_key(|o| (o.effective_datetime, o.id));

    let unit = series
        .iter()
        .rev()
        .find_map(|o| o.unit.clone())
        .or_else(|| {
            COMMON_LOINC
                .iter()
                .find(|c| c.code == code)
                .map(|c| c.unit.to_string())
        });

    Trend {
        patient_id: records.patient.id,
        code: code.to_string(),
        display: loinc_display(code),
        unit,
        period,
        data_points: series
            .into_iter()
            .map(|o| TrendPoint {
                observation_id: o.id,
                date: format_datetime(o.effective_datetime),
                value: o.value,
                unit: o.unit.clone(),
                ref_min: o.ref_min,
                ref_max: o.ref_max,
                interpretation: o.interpretation,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
    Same,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationChange {
    pub code: String,
    pub display: Option<&'static str>,
    pub baseline_value: f64,
    pub baseline_unit: Option<String>,
    pub baseline_date: String,
    pub value: f64,
    pub unit: Option<String>,
    pub date: String,
    pub difference: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDelta {
    pub report_id: Option<RecordId>,
    pub report_date: String,
    pub observations: Vec<ObservationChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub baseline_report_id: Option<RecordId>,
    pub baseline_date: Option<String>,
    pub comparisons: Vec<ReportDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Compare reports by matching their observations on LOINC code.
///
/// With a `baseline` report, up to five other reports, newest first, are
/// compared against it. Without one, the latest report is compared against
/// the one before it. `None` means the baseline is not one of the
/// patient's reports.
pub fn compare_reports(records: &PatientRecords, baseline: Option<RecordId>) -> Option<Comparison> {
    let by_id: HashMap<RecordId, &Observation> = records
        .observations
        .iter()
        .filter_map(|o| o.id.map(|id| (id, o)))
        .collect();
    let mut newest_first: Vec<&DiagnosticReport> = records.reports.iter().collect();
    newest_first.sort_by_key(|r| Reverse((r.effective_datetime, r.id)));

    let (base, others): (&DiagnosticReport, Vec<&DiagnosticReport>) = match baseline {
        Some(id) => {
            let base = *newest_first.iter().find(|r| r.id == Some(id))?;
            let others = newest_first
                .iter()
                .copied()
                .filter(|r| r.id != Some(id))
                .take(MAX_COMPARED_REPORTS)
                .collect();
            (base, others)
        }
        None => match newest_first.as_slice() {
            [latest, previous, ..] => (*previous, vec![*latest]),
            _ => {
                return Some(Comparison {
                    baseline_report_id: None,
                    baseline_date: None,
                    comparisons: Vec::new(),
                    message: Some("at least two reports are needed for a comparison".into()),
                });
            }
        },
    };

    let base_results = results_of(base, &by_id);

    let comparisons = others
        .into_iter()
        .filter_map(|report| {
            let current = results_of(report, &by_id);
            let observations: Vec<ObservationChange> = base_results
                .iter()
                .filter_map(|b| {
                    let o = current.iter().find(|o| o.code == b.code)?;
                    Some(change(b, o))
                })
                .collect();
            (!observations.is_empty()).then(|| ReportDelta {
                report_id: report.id,
                report_date: format_datetime(report.effective_datetime),
                observations,
            })
        })
        .collect();

    Some(Comparison {
        baseline_report_id: base.id,
        baseline_date: Some(format_datetime(base.effective_datetime)),
        comparisons,
        message: None,
    })
}

fn results_of<'a>(
    report: &DiagnosticReport,
    by_id: &HashMap<RecordId, &'a Observation>,
) -> Vec<&'a Observation> {
    report
        .result
        .iter()
        .filter_map(|id| by_id.get(id).copied())
        .collect()
}

fn change(baseline: &Observation, current: &Observation) -> ObservationChange {
    let difference = current.value - baseline.value;
    let direction = if difference > 0.0 {
        Direction::Increase
    } else if difference < 0.0 {
        Direction::Decrease
    } else {
        Direction::Same
    };
    ObservationChange {
        code: baseline.code.clone(),
        display: loinc_display(&baseline.code),
        baseline_value: baseline.value,
        baseline_unit: baseline.unit.clone(),
        baseline_date: format_datetime(baseline.effective_datetime),
        value: current.value,
        unit: current.unit.clone(),
        date: format_datetime(current.effective_datetime),
        difference,
        direction,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientOverview {
    pub id: Option<RecordId>,
    pub name: String,
    pub birth_date: Option<String>,
    pub age: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestObservation {
    pub observation_id: Option<RecordId>,
    pub code: String,
    pub display: Option<&'static str>,
    pub value: f64,
    pub unit: Option<String>,
    pub ref_min: Option<f64>,
    pub ref_max: Option<f64>,
    pub interpretation: Option<Interpretation>,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbnormalSeries {
    pub count: usize,
    pub values: Vec<f64>,
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counts {
    pub total_reports: usize,
    pub total_observations: usize,
    /// Number of distinct codes with at least one out-of-range value
    pub abnormal_findings: usize,
    pub latest_report_id: Option<RecordId>,
    pub latest_report_date: Option<String>,
    pub latest_observations: Vec<LatestObservation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    pub patient: PatientOverview,
    pub analytics: Counts,
    /// Out-of-range values keyed by LOINC code
    pub abnormal_biomarkers: BTreeMap<String, AbnormalSeries>,
}

pub fn summarize(records: &PatientRecords, today: Date) -> PatientSummary {
    let mut observations: Vec<&Observation> = records.observations.iter().collect();
    observations.sort_by_key(|o| (o.effective_datetime, o.id));

    let mut abnormal: BTreeMap<String, AbnormalSeries> = BTreeMap::new();
    for obs in observations.iter().filter(|o| out_of_range(o)) {
        let series = abnormal.entry(obs.code.clone()).or_default();
        series.count += 1;
        series.values.push(obs.value);
        series.dates.push(format_datetime(obs.effective_datetime));
    }

    let latest = records
        .reports
        .iter()
        .max_by_key(|r| (r.effective_datetime, r.id));
    let latest_observations = latest
        .map(|report| {
            report
                .result
                .iter()
                .filter_map(|id| observations.iter().find(|o| o.id == Some(*id)))
                .map(|o| LatestObservation {
                    observation_id: o.id,
                    code: o.code.clone(),
                    display: loinc_display(&o.code),
                    value: o.value,
                    unit: o.unit.clone(),
                    ref_min: o.ref_min,
                    ref_max: o.ref_max,
                    interpretation: o.interpretation,
                    date: format_datetime(o.effective_datetime),
                })
                .collect()
        })
        .unwrap_or_default();

    let patient = &records.patient;
    PatientSummary {
        patient: PatientOverview {
            id: patient.id,
            name: patient.name.clone(),
            birth_date: patient.birth_date.map(format_date),
            age: patient.birth_date.map(|born| age_on(born, today)),
        },
        analytics: Counts {
            total_reports: records.reports.len(),
            total_observations: records.observations.len(),
            abnormal_findings: abnormal.len(),
            latest_report_id: latest.and_then(|r| r.id),
            latest_report_date: latest.map(|r| format_datetime(r.effective_datetime)),
            latest_observations,
        },
        abnormal_biomarkers: abnormal,
    }
}

fn out_of_range(obs: &Observation) -> bool {
    obs.ref_min.is_some_and(|min| obs.value < min) || obs.ref_max.is_some_and(|max| obs.value > max)
}

/// Whole years completed between `born` and `today`.
fn age_on(born: Date, today: Date) -> i32 {
    let had_birthday = (today.month() as u8, today.day()) >= (born.month() as u8, born.day());
    today.year() - born.year() - i32::from(!had_birthday)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodwork_core::Patient;
    use time::macros::{date, datetime};

    fn glucose(id: RecordId, at: OffsetDateTime, value: f64) -> Observation {
        let mut obs = Observation::new(1, "2339-0", value, at)
            .with_id(id)
            .with_unit("mg/dL")
            .with_range(Some(70.0), Some(99.0));
        obs.derive_interpretation();
        obs
    }

    fn records() -> PatientRecords {
        let creatinine = Observation::new(1, "2160-0", 1.4, datetime!(2024-03-01 08:00:00 UTC))
            .with_id(4)
            .with_unit("mg/dL")
            .with_range(Some(0.6), Some(1.2));
        let creatinine_later = Observation::new(1, "2160-0", 1.1, datetime!(2024-06-01 08:00:00 UTC))
            .with_id(5)
            .with_unit("mg/dL")
            .with_range(Some(0.6), Some(1.2));
        PatientRecords {
            patient: Patient::new("Jane Doe")
                .with_id(1)
                .with_birth_date(date!(1980 - 06 - 15)),
            observations: vec![
                glucose(2, datetime!(2024-06-01 08:00:00 UTC), 105.0),
                glucose(1, datetime!(2024-03-01 08:00:00 UTC), 92.0),
                glucose(3, datetime!(2023-01-01 08:00:00 UTC), 64.0),
                creatinine,
                creatinine_later,
            ],
            reports: vec![
                DiagnosticReport::new(1, datetime!(2024-03-01 09:00:00 UTC))
                    .with_id(1)
                    .with_results(vec![1, 4]),
                DiagnosticReport::new(1, datetime!(2024-06-01 09:00:00 UTC))
                    .with_id(2)
                    .with_results(vec![2, 5]),
            ],
        }
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("6m".parse::<Period>().unwrap(), Period::HalfYear);
        assert_eq!("all".parse::<Period>().unwrap(), Period::All);
        assert!("2w".parse::<Period>().is_err());
    }

    #[test]
    fn test_trend_is_windowed_and_ordered() {
        let now = datetime!(2024-07-01 00:00:00 UTC);
        let all = trend(&records(), "2339-0", Period::All, now);
        let ids: Vec<_> = all.data_points.iter().map(|p| p.observation_id).collect();
        assert_eq!(ids, [Some(3), Some(1), Some(2)]);
        assert_eq!(all.unit.as_deref(), Some("mg/dL"));
        assert_eq!(all.display, Some("Glucose [Mass/volume] in Blood"));
        assert_eq!(all.data_points[0].interpretation, Some(Interpretation::Low));

        let half_year = trend(&records(), "2339-0", Period::HalfYear, now);
        assert_eq!(half_year.data_points.len(), 2);
        let month = trend(&records(), "2339-0", Period::Month, now);
        assert_eq!(month.data_points.len(), 1);
        assert_eq!(month.data_points[0].value, 105.0);
    }

    #[test]
    fn test_resolve_analyte_by_code_or_name() {
        assert_eq!(resolve_analyte("2339-0").as_deref(), Some("2339-0"));
        assert_eq!(
            resolve_analyte("hemoglobin [mass/volume] in blood").as_deref(),
            Some("718-7")
        );
        assert_eq!(resolve_analyte("glucoseish"), None);
    }

    #[test]
    fn test_latest_report_against_previous() {
        let cmp = compare_reports(&records(), None).unwrap();
        assert_eq!(cmp.baseline_report_id, Some(1));
        assert_eq!(cmp.comparisons.len(), 1);
        let delta = &cmp.comparisons[0];
        assert_eq!(delta.report_id, Some(2));
        let codes: Vec<_> = delta.observations.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, ["2339-0", "2160-0"]);
        assert_eq!(delta.observations[0].difference, 13.0);
        assert_eq!(delta.observations[0].direction, Direction::Increase);
        assert_eq!(delta.observations[1].direction, Direction::Decrease);
    }

    #[test]
    fn test_explicit_baseline() {
        let cmp = compare_reports(&records(), Some(2)).unwrap();
        assert_eq!(cmp.baseline_report_id, Some(2));
        assert_eq!(cmp.comparisons[0].report_id, Some(1));
        assert_eq!(cmp.comparisons[0].observations[0].difference, -13.0);
        assert!(compare_reports(&records(), Some(9)).is_none());
    }

    #[test]
    fn test_single_report_has_nothing_to_compare() {
        let mut recs = records();
        recs.reports.truncate(1);
        let cmp = compare_reports(&recs, None).unwrap();
        assert!(cmp.comparisons.is_empty());
        assert!(cmp.message.is_some());
    }

    #[test]
    fn test_summary() {
        let summary = summarize(&records(), date!(2024 - 06 - 14));
        assert_eq!(summary.patient.age, Some(43));
        assert_eq!(summarize(&records(), date!(2024 - 06 - 15)).patient.age, Some(44));

        let counts = &summary.analytics;
        assert_eq!((counts.total_reports, counts.total_observations), (2, 5));
        assert_eq!(counts.latest_report_id, Some(2));
        let latest: Vec<_> = counts.latest_observations.iter().map(|o| o.observation_id).collect();
        assert_eq!(latest, [Some(2), Some(5)]);

        // glucose 64 and 105, creatinine 1.4
        assert_eq!(counts.abnormal_findings, 2);
        assert_eq!(summary.abnormal_biomarkers["2339-0"].values, [64.0, 105.0]);
        assert_eq!(summary.abnormal_biomarkers["2160-0"].count, 1);
    }
}
