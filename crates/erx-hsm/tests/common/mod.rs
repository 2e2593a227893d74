#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use erx_core::{BlobEntry, BlobId, BlobName, BlobType, ErpBlob, NewBlobEntry};
use erx_db_memory::InMemoryBlobStore;
use erx_hsm::Clock;
use erx_storage::{BlobStore, StorageError};
use time::OffsetDateTime;

/// In-memory store that counts listings and can be told to misbehave.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryBlobStore,
    lists: AtomicUsize,
    fail_lists: AtomicBool,
    duplicate_ids: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn set_fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn set_duplicate_ids(&self, duplicate: bool) {
        self.duplicate_ids.store(duplicate, Ordering::SeqCst);
    }

    /// Inserts behind the cache's back, like another instance would.
    pub async fn add(&self, entry: NewBlobEntry) -> BlobId {
        self.inner.insert(entry).await.unwrap()
    }
}

#[async_trait]
impl BlobStore for CountingStore {
    async fn list_all_sorted_by_id(&self) -> Result<Vec<BlobEntry>, StorageError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StorageError::connection_error("database is down"));
        }
        let mut entries = self.inner.list_all_sorted_by_id().await?;
        if self.duplicate_ids.load(Ordering::SeqCst) {
            if let Some(first) = entries.first().cloned() {
                entries.push(first);
            }
        }
        Ok(entries)
    }

    async fn insert(&self, entry: NewBlobEntry) -> Result<BlobId, StorageError> {
        self.inner.insert(entry).await
    }

    async fn delete(&self, blob_type: BlobType, name: &BlobName) -> Result<(), StorageError> {
        self.inner.delete(blob_type, name).await
    }

    async fn has_valid_of_type(&self, types: &[BlobType]) -> Result<Vec<bool>, StorageError> {
        self.inner.has_valid_of_type(types).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

pub fn blob(blob_type: BlobType, name: &str) -> NewBlobEntry {
    NewBlobEntry::new(blob_type, name, ErpBlob::new(name.as_bytes().to_vec(), 1))
}

/// A clock that starts at `base` and is moved forward by the test.
pub struct ManualClock {
    base: OffsetDateTime,
    offset_secs: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(base: OffsetDateTime) -> Self {
        Self {
            base,
            offset_secs: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.offset_secs.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn clock(&self) -> Clock {
        let base = self.base;
        let offset = Arc::clone(&self.offset_secs);
        Arc::new(move || base + time::Duration::seconds(offset.load(Ordering::SeqCst)))
    }
}
