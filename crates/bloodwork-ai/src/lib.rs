//! # bloodwork-ai
//!
//! Sends a patient's laboratory data together with a question to a
//! configured language model and returns the answer.
//!
//! Providers implement [`AiProvider`]. The [`ConsultationService`] builds
//! one provider per configured kind from an [`AiConfig`] and applies the
//! privacy policy, timeout, retry and fallback rules around each call.

pub mod config;
pub mod context;
pub mod error;
pub mod provider;
pub mod providers;
pub mod service;

pub use config::AiConfig;
pub use context::{ContextType, PatientRecords, build_context, text_summary};
pub use error::AiError;
pub use provider::{AiProvider, Locality, ProviderKind};
pub use service::{ConsultRequest, ConsultResponse, ConsultationService, ProviderInfo};
