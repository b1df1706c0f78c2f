pub mod error;
pub mod id;
pub mod model;
pub mod time;

pub use error::{CoreError, Result};
pub use id::{RecordId, parse_record_id};
pub use model::{
    DiagnosticReport, DomainRecord, Gender, Interpretation, Observation, ObservationStatus,
    Patient, RecordKind, ReportStatus,
};
