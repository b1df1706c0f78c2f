use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bloodwork_core::{DomainRecord, RecordId, RecordKind};
use bloodwork_storage::{RecordFilter, RecordStore, StorageError};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<RecordId, DomainRecord>,
    /// Last id handed out. Ids are never reused.
    last_id: RecordId,
}

/// In-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<RecordKind, Table>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn load(
        &self,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<Option<DomainRecord>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&kind).and_then(|t| t.rows.get(&id)).cloned())
    }

    async fn save(&self, mut record: DomainRecord) -> Result<DomainRecord, StorageError> {
        let kind = record.kind();
        let mut tables = self.tables.write().await;
        let table = tables.entry(kind).or_default();
        let id = match record.id() {
            Some(id) if table.rows.contains_key(&id) => id,
            Some(id) => return Err(StorageError::not_found(kind.as_str(), id)),
            None => {
                table.last_id += 1;
                record.set_id(table.last_id);
                table.last_id
            }
        };
        table.rows.insert(id, record.clone());
        tracing::trace!(kind = %kind, id, "record saved");
        Ok(record)
    }

    async fn delete(&self, kind: RecordKind, id: RecordId) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let removed = tables
            .get_mut(&kind)
            .is_some_and(|t| t.rows.remove(&id).is_some());
        if removed {
            tracing::trace!(kind = %kind, id, "record deleted");
        }
        Ok(removed)
    }

    async fn delete_matching(
        &self,
        kind: RecordKind,
        filter: &RecordFilter,
    ) -> Result<usize, StorageError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&kind) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|_, record| !filter.matches(record));
        Ok(before - table.rows.len())
    }

    async fn query(
        &self,
        kind: RecordKind,
        filter: &RecordFilter,
    ) -> Result<Vec<DomainRecord>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&kind)
            .map(|t| {
                t.rows
                    .values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, kind: RecordKind) -> Result<usize, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&kind).map_or(0, |t| t.rows.len()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodwork_core::{Observation, Patient};
    use bloodwork_storage::RecordStoreExt;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let store = InMemoryStore::new();
        let a = store.save(Patient::new("A").into()).await.unwrap();
        let b = store.save(Patient::new("B").into()).await.unwrap();
        assert_eq!(a.id(), Some(1));
        assert_eq!(b.id(), Some(2));

        // ids are counted per kind
        let obs = Observation::new(1, "2339-0", 90.0, datetime!(2024-01-01 08:00:00 UTC));
        let obs = store.save(obs.into()).await.unwrap();
        assert_eq!(obs.id(), Some(1));
        assert_eq!(store.count(RecordKind::Patient).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_load() {
        let store = InMemoryStore::new();
        let saved = store.save(Patient::new("Jane").into()).await.unwrap();
        let id = saved.id().unwrap();

        let renamed = Patient::new("Jane Doe").with_id(id);
        store.save(renamed.clone().into()).await.unwrap();
        assert_eq!(store.load_patient(id).await.unwrap(), Some(renamed));
    }

    #[tokio::test]
    async fn test_save_unknown_id_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .save(Patient::new("Ghost").with_id(42).into())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = InMemoryStore::new();
        store.save(Patient::new("A").into()).await.unwrap();
        let b = store.save(Patient::new("B").into()).await.unwrap();
        assert!(store.delete(RecordKind::Patient, 2).await.unwrap());
        assert!(!store.delete(RecordKind::Patient, 2).await.unwrap());
        assert!(store.load(RecordKind::Patient, 2).await.unwrap().is_none());
        let c = store.save(Patient::new("C").into()).await.unwrap();
        assert_ne!(c.id(), b.id());
        assert_eq!(c.id(), Some(3));
    }

    #[tokio::test]
    async fn test_query_and_delete_matching() {
        let store = InMemoryStore::new();
        let at = datetime!(2024-01-01 08:00:00 UTC);
        for (patient, code) in [(1, "2339-0"), (1, "718-7"), (2, "2339-0")] {
            store
                .save(Observation::new(patient, code, 1.0, at).into())
                .await
                .unwrap();
        }

        let glucose = store
            .observations(&RecordFilter::new().with_code("2339-0"))
            .await
            .unwrap();
        assert_eq!(glucose.len(), 2);
        assert!(glucose.windows(2).all(|w| w[0].id < w[1].id));

        let removed = store
            .delete_matching(RecordKind::Observation, &RecordFilter::new().with_patient(1))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count(RecordKind::Observation).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryStore::new();
        assert_eq!(store.count(RecordKind::DiagnosticReport).await.unwrap(), 0);
        assert!(
            store
                .query(RecordKind::Patient, &RecordFilter::new())
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(store.backend_name(), "memory");
    }
}
