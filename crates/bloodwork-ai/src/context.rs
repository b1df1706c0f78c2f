//! Rendering patient data into the context passed to a provider.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use bloodwork_core::time::format_datetime;
use bloodwork_core::{DiagnosticReport, Observation, Patient};
use serde::{Deserialize, Serialize};

use crate::error::AiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    /// The patient's FHIR `collection` Bundle
    FhirBundle,
    /// One line per observation
    #[default]
    TextSummary,
    /// Domain records as JSON
    RawData,
    None,
}

impl ContextType {
    pub const ALL: [ContextType; 4] = [
        ContextType::FhirBundle,
        ContextType::TextSummary,
        ContextType::RawData,
        ContextType::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::FhirBundle => "fhir_bundle",
            ContextType::TextSummary => "text_summary",
            ContextType::RawData => "raw_data",
            ContextType::None => "none",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ContextType::FhirBundle => "Full FHIR data",
            ContextType::TextSummary => "Text summary",
            ContextType::RawData => "Raw data",
            ContextType::None => "No patient data",
        }
    }

    pub fn needs_patient(&self) -> bool {
        *self != ContextType::None
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContextType::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                AiError::validation("context_type", format!("unknown context type '{s}'"))
            })
    }
}

/// Everything stored for one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecords {
    pub patient: Patient,
    pub observations: Vec<Observation>,
    pub reports: Vec<DiagnosticReport>,
}

/// Render `records` as the given context type. `None` renders as an empty string.
pub fn build_context(context_type: ContextType, records: Option<&PatientRecords>) -> String {
    let Some(records) = records else {
        return String::new();
    };
    match context_type {
        ContextType::FhirBundle => {
            let bundle = bloodwork_fhir::to_bundle(
                &records.patient,
                &records.observations,
                &records.reports,
            );
            serde_json::to_string(&bundle).unwrap_or_default()
        }
        ContextType::TextSummary => text_summary(&records.observations),
        ContextType::RawData => serde_json::to_string(records).unwrap_or_default(),
        ContextType::None => String::new(),
    }
}

/// `code | date | value unit | [low-high] | interpretation`, one line per
/// observation in chronological order.
pub fn text_summary(observations: &[Observation]) -> String {
    let mut sorted: Vec<&Observation> = observations.iter().collect();
    sorted.sort_by_key(|o| (o.effective_datetime, o.id));

    let mut out = String::from("LAB RESULTS SUMMARY:\n\n");
    for o in sorted {
        let value = match &o.unit {
            Some(unit) => format!("{} {unit}", o.value),
            None => o.value.to_string(),
        };
        let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_default();
        let interpretation = o.interpretation.map(|i| i.display()).unwrap_or_default();
        let _ = writeln!(
            out,
            "{} | {} | {} | [{}-{}] | {}",
            o.code,
            format_datetime(o.effective_datetime),
            value,
            bound(o.ref_min),
            bound(o.ref_max),
            interpretation
        );
    }
    out
}
