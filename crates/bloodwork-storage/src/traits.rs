//! Storage traits for bloodwork records.

use std::sync::Arc;

use async_trait::async_trait;
use bloodwork_core::{DiagnosticReport, DomainRecord, Observation, Patient, RecordId, RecordKind};

use crate::error::StorageError;
use crate::filter::RecordFilter;

/// The trait every storage backend implements.
///
/// Records are keyed by `(RecordKind, RecordId)`. Ids are positive and
/// assigned by the backend; an id is never reused after deletion.
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use bloodwork_storage::{RecordStore, StorageError};
/// use bloodwork_core::{DomainRecord, RecordKind};
///
/// async fn get_patient(store: &dyn RecordStore, id: u64) -> Result<DomainRecord, StorageError> {
///     store
///         .load(RecordKind::Patient, id)
///         .await?
///         .ok_or_else(|| StorageError::not_found("Patient", id))
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads a record by kind and id.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing records.
    async fn load(
        &self,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<Option<DomainRecord>, StorageError>;

    /// Inserts or replaces a record and returns it as stored.
    ///
    /// A record without an id is inserted under a freshly assigned one. A
    /// record with an id replaces the stored record of the same kind.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record has an id that does not exist.
    async fn save(&self, record: DomainRecord) -> Result<DomainRecord, StorageError>;

    /// Deletes a record. Returns `false` if nothing was stored under the id.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn delete(&self, kind: RecordKind, id: RecordId) -> Result<bool, StorageError>;

    /// Deletes every record of `kind` matching `filter` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn delete_matching(
        &self,
        kind: RecordKind,
        filter: &RecordFilter,
    ) -> Result<usize, StorageError>;

    /// Returns every record of `kind` matching `filter`, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn query(
        &self,
        kind: RecordKind,
        filter: &RecordFilter,
    ) -> Result<Vec<DomainRecord>, StorageError>;

    /// Number of stored records of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn count(&self, kind: RecordKind) -> Result<usize, StorageError>;

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

pub type DynRecordStore = Arc<dyn RecordStore>;

/// Typed accessors over any [`RecordStore`].
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn load_patient(&self, id: RecordId) -> Result<Option<Patient>, StorageError> {
        match self.load(RecordKind::Patient, id).await? {
            Some(DomainRecord::Patient(p)) => Ok(Some(p)),
            Some(other) => Err(kind_mismatch(RecordKind::Patient, &other)),
            None => Ok(None),
        }
    }

    async fn load_observation(&self, id: RecordId) -> Result<Option<Observation>, StorageError> {
        match self.load(RecordKind::Observation, id).await? {
            Some(DomainRecord::Observation(o)) => Ok(Some(o)),
            Some(other) => Err(kind_mismatch(RecordKind::Observation, &other)),
            None => Ok(None),
        }
    }

    async fn load_report(&self, id: RecordId) -> Result<Option<DiagnosticReport>, StorageError> {
        match self.load(RecordKind::DiagnosticReport, id).await? {
            Some(DomainRecord::DiagnosticReport(r)) => Ok(Some(r)),
            Some(other) => Err(kind_mismatch(RecordKind::DiagnosticReport, &other)),
            None => Ok(None),
        }
    }

    async fn patients(&self, filter: &RecordFilter) -> Result<Vec<Patient>, StorageError> {
        let records = self.query(RecordKind::Patient, filter).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r {
                DomainRecord::Patient(p) => Some(p),
                _ => None,
            })
            .collect())
    }

    async fn observations(&self, filter: &RecordFilter) -> Result<Vec<Observation>, StorageError> {
        let records = self.query(RecordKind::Observation, filter).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r {
                DomainRecord::Observation(o) => Some(o),
                _ => None,
            })
            .collect())
    }

    async fn reports(&self, filter: &RecordFilter) -> Result<Vec<DiagnosticReport>, StorageError> {
        let records = self.query(RecordKind::DiagnosticReport, filter).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r {
                DomainRecord::DiagnosticReport(d) => Some(d),
                _ => None,
            })
            .collect())
    }

    async fn patient_exists(&self, id: RecordId) -> Result<bool, StorageError> {
        Ok(self.load(RecordKind::Patient, id).await?.is_some())
    }
}

impl<T: RecordStore + ?Sized> RecordStoreExt for T {}

fn kind_mismatch(expected: RecordKind, found: &DomainRecord) -> StorageError {
    StorageError::internal(format!(
        "backend returned {} for a {expected} lookup",
        found.kind()
    ))
}
