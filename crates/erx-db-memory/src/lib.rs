//! In-memory blob store backend.
//!
//! This crate provides an in-memory implementation of the `BlobStore` trait
//! from `erx-storage`. It is used by tests and by single-process setups that
//! do not need durable storage.
//!
//! # Example
//!
//! ```ignore
//! use erx_db_memory::InMemoryBlobStore;
//! use erx_storage::BlobStore;
//!
//! let store = InMemoryBlobStore::new();
//! let id = store
//!     .insert(NewBlobEntry::new(BlobType::VauSig, "sig", ErpBlob::new(b"..".to_vec(), 1)))
//!     .await?;
//! ```

pub mod storage;

pub use erx_storage::{BlobStore, StorageError};
pub use storage::InMemoryBlobStore;

/// Creates a new shareable in-memory blob store.
pub fn create_blob_store() -> erx_storage::DynBlobStore {
    std::sync::Arc::new(InMemoryBlobStore::new())
}
