use super::{DiagnosticReport, Observation, Patient};
use crate::error::{CoreError, Result};
use crate::id::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// The record types managed by the tracker, named after their FHIR resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    Patient,
    Observation,
    DiagnosticReport,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Patient,
        RecordKind::Observation,
        RecordKind::DiagnosticReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Patient => "Patient",
            RecordKind::Observation => "Observation",
            RecordKind::DiagnosticReport => "DiagnosticReport",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Patient" => Ok(RecordKind::Patient),
            "Observation" => Ok(RecordKind::Observation),
            "DiagnosticReport" => Ok(RecordKind::DiagnosticReport),
            other => Err(CoreError::validation(
                "resourceType",
                format!("unsupported resource type '{other}'"),
            )),
        }
    }
}

/// Any domain record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainRecord {
    Patient(Patient),
    Observation(Observation),
    DiagnosticReport(DiagnosticReport),
}

impl DomainRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            DomainRecord::Patient(_) => RecordKind::Patient,
            DomainRecord::Observation(_) => RecordKind::Observation,
            DomainRecord::DiagnosticReport(_) => RecordKind::DiagnosticReport,
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        match self {
            DomainRecord::Patient(p) => p.id,
            DomainRecord::Observation(o) => o.id,
            DomainRecord::DiagnosticReport(r) => r.id,
        }
    }

    pub fn set_id(&mut self, id: RecordId) {
        match self {
            DomainRecord::Patient(p) => p.id = Some(id),
            DomainRecord::Observation(o) => o.id = Some(id),
            DomainRecord::DiagnosticReport(r) => r.id = Some(id),
        }
    }

    /// Owning patient. For a patient this is its own id.
    pub fn patient_id(&self) -> Option<RecordId> {
        match self {
            DomainRecord::Patient(p) => p.id,
            DomainRecord::Observation(o) => Some(o.patient_id),
            DomainRecord::DiagnosticReport(r) => Some(r.patient_id),
        }
    }

    pub fn effective_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            DomainRecord::Patient(_) => None,
            DomainRecord::Observation(o) => Some(o.effective_datetime),
            DomainRecord::DiagnosticReport(r) => Some(r.effective_datetime),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            DomainRecord::Patient(p) => p.validate(),
            DomainRecord::Observation(o) => o.validate(),
            DomainRecord::DiagnosticReport(r) => r.validate(),
        }
    }
}

impl From<Patient> for DomainRecord {
    fn from(p: Patient) -> Self {
        DomainRecord::Patient(p)
    }
}

impl From<Observation> for DomainRecord {
    fn from(o: Observation) -> Self {
        DomainRecord::Observation(o)
    }
}

impl From<DiagnosticReport> for DomainRecord {
    fn from(r: DiagnosticReport) -> Self {
        DomainRecord::DiagnosticReport(r)
    }
}
