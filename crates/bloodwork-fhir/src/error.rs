use thiserror::Error;

/// Failure translating between a FHIR resource and a domain record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("missing required element '{path}'")]
    MissingField { path: String },

    #[error("invalid type at '{path}': expected {expected}")]
    InvalidType { path: String, expected: &'static str },

    #[error("invalid code '{value}' at '{path}'")]
    InvalidCode { path: String, value: String },

    #[error("invalid code system '{found}' at '{path}', expected '{expected}'")]
    InvalidSystem {
        path: String,
        expected: &'static str,
        found: String,
    },

    #[error("invalid date/time '{value}' at '{path}'")]
    InvalidDate { path: String, value: String },

    #[error("invalid reference '{value}' at '{path}', expected {expected}/{{id}}")]
    InvalidReference {
        path: String,
        value: String,
        expected: &'static str,
    },

    #[error("invalid value at '{path}': {message}")]
    InvalidValue { path: String, message: String },

    #[error("unexpected resourceType '{found}' at '{path}', expected {expected}")]
    WrongResourceType {
        path: String,
        expected: String,
        found: String,
    },
}

impl MappingError {
    pub fn missing(path: impl Into<String>) -> Self {
        Self::MissingField { path: path.into() }
    }

    pub fn invalid_value(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Path of the offending element, relative to the resource root
    pub fn path(&self) -> &str {
        match self {
            Self::MissingField { path }
            | Self::InvalidType { path, .. }
            | Self::InvalidCode { path, .. }
            | Self::InvalidSystem { path, .. }
            | Self::InvalidDate { path, .. }
            | Self::InvalidReference { path, .. }
            | Self::InvalidValue { path, .. }
            | Self::WrongResourceType { path, .. } => path,
        }
    }

    /// Re-root the error path under `prefix` (e.g. `entry[2].resource`).
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        let path = match &mut self {
            Self::MissingField { path }
            | Self::InvalidType { path, .. }
            | Self::InvalidCode { path, .. }
            | Self::InvalidSystem { path, .. }
            | Self::InvalidDate { path, .. }
            | Self::InvalidReference { path, .. }
            | Self::InvalidValue { path, .. }
            | Self::WrongResourceType { path, .. } => path,
        };
        *path = if path.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}.{path}")
        };
        self
    }
}
