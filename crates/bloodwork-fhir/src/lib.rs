//! FHIR R4 view of the bloodwork domain model.
//!
//! Records are the source of truth; FHIR resources are derived on every read
//! and parsed back with [`from_fhir`]. Every failure carries the path of the
//! offending element.

mod bundle;
mod error;
mod json;
mod mapper;
mod observation;
mod patient;
mod report;
pub mod systems;
pub mod terminology;

pub use bundle::{parse_bundle, to_bundle};
pub use error::MappingError;
pub use mapper::{FhirResource, from_fhir, parse_reference, to_fhir};
pub use observation::{observation_from_fhir, observation_to_fhir};
pub use patient::{patient_from_fhir, patient_to_fhir};
pub use report::{report_from_fhir, report_to_fhir};
