//! # bloodwork-storage
//!
//! Persistence interface for the bloodwork tracker.
//!
//! Backends implement [`RecordStore`]: load a record by kind and id, save a
//! record (assigning an id to new ones), delete, and query with a
//! [`RecordFilter`]. Ordering and pagination are left to the caller.
//!
//! ```ignore
//! use bloodwork_storage::{RecordFilter, RecordStoreExt};
//!
//! let filter = RecordFilter::new().with_patient(1).with_code("2339-0");
//! let glucose = store.observations(&filter).await?;
//! ```

pub mod error;
pub mod filter;
pub mod traits;

pub use error::StorageError;
pub use filter::RecordFilter;
pub use traits::{DynRecordStore, RecordStore, RecordStoreExt};
