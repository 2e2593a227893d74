//! Storage traits for the blob store abstraction layer.
//!
//! This module defines the contract every blob store backend implements.

use async_trait::async_trait;
use erx_core::{BlobEntry, BlobId, BlobName, BlobType, NewBlobEntry};

use crate::error::StorageError;

/// Durable storage of HSM blobs.
///
/// The store may be modified concurrently by other processes; callers must
/// not assume that two reads observe the same state. Implementations must be
/// thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use erx_storage::{BlobStore, StorageError};
///
/// async fn count_quotes(store: &dyn BlobStore) -> Result<usize, StorageError> {
///     let all = store.list_all_sorted_by_id().await?;
///     Ok(all.iter().filter(|e| e.blob_type == BlobType::Quote).count())
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns every blob relevant to this instance, ascending by id.
    ///
    /// The result must be consistent as of a single instant. Backends may
    /// scope the result (e.g. to the current host); callers do not interpret
    /// that scoping.
    async fn list_all_sorted_by_id(&self) -> Result<Vec<BlobEntry>, StorageError>;

    /// Stores a new blob and returns the id assigned to it.
    ///
    /// Ids are strictly increasing and never reused.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the name is already used for the type.
    /// Returns `StorageError::InvalidBlob` if the entry is not self-consistent.
    async fn insert(&self, entry: NewBlobEntry) -> Result<BlobId, StorageError>;

    /// Deletes the blob with the given type and name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such blob exists.
    /// Returns `StorageError::Conflict` if the blob is still referenced.
    async fn delete(&self, blob_type: BlobType, name: &BlobName) -> Result<(), StorageError>;

    /// For every requested type, whether at least one time-valid blob exists.
    ///
    /// This is a diagnostic query that is answered by the store directly.
    async fn has_valid_of_type(&self, types: &[BlobType]) -> Result<Vec<bool>, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
