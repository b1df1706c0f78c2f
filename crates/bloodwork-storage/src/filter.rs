//! Record filters applied by storage backends.

use bloodwork_core::{DomainRecord, RecordId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Conjunction of optional predicates. An empty filter matches everything.
///
/// Date bounds are inclusive and apply to `effective_datetime`; records
/// without one (patients) never match a date bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub patient_id: Option<RecordId>,
    /// LOINC code (observations only)
    pub code: Option<String>,
    pub date_ge: Option<OffsetDateTime>,
    pub date_le: Option<OffsetDateTime>,
    /// Case-insensitive substring of the patient name (patients only)
    pub name: Option<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(mut self, patient_id: RecordId) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_date_ge(mut self, at: OffsetDateTime) -> Self {
        self.date_ge = Some(at);
        self
    }

    pub fn with_date_le(mut self, at: OffsetDateTime) -> Self {
        self.date_le = Some(at);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &DomainRecord) -> bool {
        if let Some(pid) = self.patient_id {
            if record.patient_id() != Some(pid) {
                return false;
            }
        }
        if let Some(code) = &self.code {
            match record {
                DomainRecord::Observation(o) if &o.code == code => {}
                _ => return false,
            }
        }
        if self.date_ge.is_some() || self.date_le.is_some() {
            let Some(at) = record.effective_datetime() else {
                return false;
            };
            if self.date_ge.is_some_and(|ge| at < ge) || self.date_le.is_some_and(|le| at > le) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            let needle = name.to_lowercase();
            match record {
                DomainRecord::Patient(p) if p.name.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodwork_core::{DiagnosticReport, Observation, Patient};
    use time::macros::datetime;

    fn obs_at(at: OffsetDateTime) -> DomainRecord {
        Observation::new(1, "2339-0", 5.0, at).with_id(1).into()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = RecordFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&Patient::new("A").with_id(1).into()));
        assert!(filter.matches(&obs_at(datetime!(2024-01-01 00:00:00 UTC))));
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let ge = datetime!(2024-01-01 00:00:00 UTC);
        let le = datetime!(2024-01-31 23:59:59 UTC);
        let filter = RecordFilter::new().with_date_ge(ge).with_date_le(le);
        assert!(filter.matches(&obs_at(ge)));
        assert!(filter.matches(&obs_at(le)));
        assert!(filter.matches(&obs_at(datetime!(2024-01-15 12:00:00 UTC))));
        assert!(!filter.matches(&obs_at(datetime!(2023-12-31 23:59:59 UTC))));
        assert!(!filter.matches(&obs_at(datetime!(2024-02-01 00:00:00 UTC))));
    }

    #[test]
    fn test_patient_and_code() {
        let at = datetime!(2024-01-01 00:00:00 UTC);
        let filter = RecordFilter::new().with_patient(1).with_code("2339-0");
        assert!(filter.matches(&obs_at(at)));
        assert!(!filter.matches(&Observation::new(2, "2339-0", 1.0, at).into()));
        assert!(!filter.matches(&Observation::new(1, "718-7", 1.0, at).into()));
        assert!(!filter.matches(&DiagnosticReport::new(1, at).into()));
    }

    #[test]
    fn test_name_filter() {
        let filter = RecordFilter::new().with_name("doe");
        assert!(filter.matches(&Patient::new("Jane Doe").into()));
        assert!(!filter.matches(&Patient::new("John Smith").into()));
    }

    #[test]
    fn test_date_bound_never_matches_patient() {
        let filter = RecordFilter::new().with_date_ge(datetime!(2000-01-01 00:00:00 UTC));
        assert!(!filter.matches(&Patient::new("A").into()));
    }
}
