use thiserror::Error;

/// Failures of domain validation and parsing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A field value breaks a domain rule. `path` names the field.
    #[error("{path}: {message}")]
    Validation { path: String, message: String },

    #[error("not a valid date/time: '{0}'")]
    InvalidDateTime(String),

    #[error("not a valid record id: '{0}'")]
    InvalidId(String),

    #[error("{kind}/{id} does not exist")]
    NotFound { kind: String, id: String },

    #[error("at most {limit} patient profiles may exist")]
    ProfileLimit { limit: usize },
}

impl CoreError {
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_date_time(value: impl Into<String>) -> Self {
        Self::InvalidDateTime(value.into())
    }

    pub fn invalid_id(value: impl Into<String>) -> Self {
        Self::InvalidId(value.into())
    }

    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// The offending field of a validation failure.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Validation { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
