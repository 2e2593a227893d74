//! # erx-storage
//!
//! Storage abstraction layer for HSM blobs.
//!
//! This crate defines the trait and error types that all blob store backends
//! implement. It does not contain any implementations - those are provided by
//! separate crates (`erx-db-memory`, `erx-db-postgres`).
//!
//! ## Storage Backends
//!
//! ```ignore
//! use async_trait::async_trait;
//! use erx_storage::{BlobStore, StorageError};
//!
//! struct MyStore {
//!     // ...
//! }
//!
//! #[async_trait]
//! impl BlobStore for MyStore {
//!     async fn list_all_sorted_by_id(&self) -> Result<Vec<BlobEntry>, StorageError> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::BlobStore;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared blob store trait object.
pub type DynBlobStore = std::sync::Arc<dyn BlobStore>;
