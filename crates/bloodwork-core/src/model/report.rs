use super::codes::ReportStatus;
use crate::error::{CoreError, Result};
use crate::id::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use time::OffsetDateTime;

pub const DEFAULT_REPORT_CATEGORY: &str = "LAB";

fn default_category() -> String {
    DEFAULT_REPORT_CATEGORY.to_string()
}

/// A diagnostic report grouping observations of one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub patient_id: RecordId,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(with = "crate::time::serde_datetime")]
    pub effective_datetime: OffsetDateTime,
    #[serde(
        default,
        with = "crate::time::serde_datetime::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    /// SNOMED CT code summarising the conclusion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion_code: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    /// Observation ids
    #[serde(default)]
    pub result: Vec<RecordId>,
}

impl DiagnosticReport {
    pub fn new(patient_id: RecordId, effective_datetime: OffsetDateTime) -> Self {
        Self {
            id: None,
            patient_id,
            status: ReportStatus::default(),
            effective_datetime,
            issued: None,
            conclusion: None,
            conclusion_code: None,
            category: default_category(),
            result: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_conclusion(mut self, conclusion: impl Into<String>) -> Self {
        self.conclusion = Some(conclusion.into());
        self
    }

    pub fn with_results(mut self, result: Vec<RecordId>) -> Self {
        self.result = result;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.patient_id == 0 {
            return Err(CoreError::validation("patient_id", "must reference a patient"));
        }
        let mut seen = HashSet::new();
        for (i, id) in self.result.iter().enumerate() {
            if *id == 0 || !seen.insert(*id) {
                return Err(CoreError::validation(
                    format!("result[{i}]"),
                    format!("invalid or duplicate observation id {id}"),
                ));
            }
        }
        Ok(())
    }
}
