use crate::error::{CoreError, Result};

/// Store-assigned record identifier. The FHIR `id` is its decimal form.
pub type RecordId = u64;

/// Parse a positive decimal record id.
pub fn parse_record_id(s: &str) -> Result<RecordId> {
    match s.trim().parse::<RecordId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CoreError::invalid_id(s)),
    }
}
