use std::collections::BTreeMap;

use async_trait::async_trait;
use erx_core::{BlobEntry, BlobId, BlobName, BlobType, NewBlobEntry};
use erx_storage::{BlobStore, StorageError};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory blob store.
///
/// Entries are kept ordered by id, so listing needs no sort. Ids start at 1
/// and are never reused, even after a delete.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: BTreeMap<BlobId, BlobEntry>,
    next_id: u64,
}

impl InMemoryBlobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the store holds no blobs.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn list_all_sorted_by_id(&self) -> Result<Vec<BlobEntry>, StorageError> {
        let guard = self.inner.read().await;
        Ok(guard.entries.values().cloned().collect())
    }

    async fn insert(&self, entry: NewBlobEntry) -> Result<BlobId, StorageError> {
        if let Some(message) = entry.consistency_error() {
            return Err(StorageError::invalid_blob(message));
        }

        let mut guard = self.inner.write().await;
        let duplicate = guard
            .entries
            .values()
            .any(|e| e.blob_type == entry.blob_type && e.name == entry.name);
        if duplicate {
            return Err(StorageError::conflict(format!(
                "blob {}/{} already exists",
                entry.blob_type, entry.name
            )));
        }

        let id = BlobId::new(guard.next_id);
        guard.next_id += 1;
        debug!(blob_type = %entry.blob_type, name = %entry.name, id = %id, "stored blob");
        guard.entries.insert(id, BlobEntry::from_new(id, entry));
        Ok(id)
    }

    async fn delete(&self, blob_type: BlobType, name: &BlobName) -> Result<(), StorageError> {
        let mut guard = self.inner.write().await;
        let id = guard
            .entries
            .values()
            .find(|e| e.blob_type == blob_type && &e.name == name)
            .map(|e| e.id)
            .ok_or_else(|| StorageError::not_found(blob_type, name.clone()))?;
        guard.entries.remove(&id);
        debug!(blob_type = %blob_type, name = %name, id = %id, "deleted blob");
        Ok(())
    }

    async fn has_valid_of_type(&self, types: &[BlobType]) -> Result<Vec<bool>, StorageError> {
        let now = OffsetDateTime::now_utc();
        let guard = self.inner.read().await;
        Ok(types
            .iter()
            .map(|ty| {
                guard
                    .entries
                    .values()
                    .any(|e| e.blob_type == *ty && e.is_time_valid_at(now))
            })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
