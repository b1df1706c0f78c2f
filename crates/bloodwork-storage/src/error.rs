//! Storage error types.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("Record not found: {kind}/{id}")]
    NotFound { kind: String, id: String },

    /// The record cannot be stored as given.
    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    /// The backend is not reachable.
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        let err = StorageError::not_found("Observation", 12);
        assert_eq!(err.to_string(), "Record not found: Observation/12");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_variants() {
        assert!(!StorageError::internal("lock poisoned").is_not_found());
        assert_eq!(
            StorageError::unavailable("db down").to_string(),
            "Storage unavailable: db down"
        );
        assert_eq!(
            StorageError::invalid_record("kind mismatch").to_string(),
            "Invalid record: kind mismatch"
        );
    }
}
