mod codes;
mod observation;
mod patient;
mod record;
mod report;

pub use codes::{Gender, Interpretation, ObservationStatus, ReportStatus};
pub use observation::{DEFAULT_OBSERVATION_CATEGORY, Observation};
pub use patient::Patient;
pub use record::{DomainRecord, RecordKind};
pub use report::{DEFAULT_REPORT_CATEGORY, DiagnosticReport};
