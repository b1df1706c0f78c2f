//! In-memory backend for [`bloodwork_storage::RecordStore`].
//!
//! Records live in one ordered map per kind behind a single
//! `tokio::sync::RwLock`, so every operation sees a consistent snapshot and
//! writers are serialised.

mod storage;

pub use storage::InMemoryStore;

use std::sync::Arc;

use bloodwork_storage::DynRecordStore;

/// Creates an empty store behind the shared trait object.
pub fn create_storage() -> DynRecordStore {
    Arc::new(InMemoryStore::new())
}
