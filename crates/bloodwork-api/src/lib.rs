//! HTTP-facing types shared by the REST and FHIR endpoints.
//!
//! Errors render as FHIR `OperationOutcome` resources; successful bodies go
//! through [`ApiResponse`], which picks the media type.

mod bundle;
mod capability;
mod error;
mod negotiation;
mod outcome;
mod response;

pub use bundle::{Bundle, BundleEntry, BundleLink, BundleType, SearchEntryMode, build_search_links};
pub use capability::{CapabilityStatement, Interaction, ResourceCapability, RestCapability, SearchParam};
pub use error::ApiError;
pub use negotiation::{validate_accept, validate_content_type};
pub use outcome::{IssueSeverity, OperationOutcome, OperationOutcomeIssue};
pub use response::ApiResponse;

pub const FHIR_JSON: &str = "application/fhir+json";
pub const JSON: &str = "application/json";
pub const JSON_PATCH: &str = "application/json-patch+json";
pub const MERGE_PATCH: &str = "application/merge-patch+json";
