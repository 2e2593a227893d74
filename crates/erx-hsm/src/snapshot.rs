use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use erx_core::{BlobEntry, BlobId, BlobType, PlatformState};
use time::OffsetDateTime;
use tracing::error;

use crate::error::BlobCacheError;

/// Immutable index over one listing of the blob store.
///
/// `by_id` holds every listed blob. `by_type` only holds blobs that were
/// valid when the snapshot was built, newest (highest id) first.
#[derive(Debug, Default)]
pub struct BlobSnapshot {
    sequence: u64,
    by_id: HashMap<BlobId, Arc<BlobEntry>>,
    by_type: HashMap<BlobType, Vec<Arc<BlobEntry>>>,
}

impl BlobSnapshot {
    /// Indexes `entries`.
    ///
    /// `sequence` orders snapshots by the time their listing was taken.
    ///
    /// # Errors
    ///
    /// Returns `BlobCacheError::Corrupted` if two entries share an id.
    pub fn build(
        sequence: u64,
        entries: Vec<BlobEntry>,
        now: OffsetDateTime,
        state: &PlatformState,
    ) -> Result<Self, BlobCacheError> {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_type: HashMap<BlobType, Vec<Arc<BlobEntry>>> = HashMap::new();

        for entry in entries.into_iter().rev() {
            let entry = Arc::new(entry);
            match by_id.entry(entry.id) {
                Entry::Occupied(_) => {
                    error!(
                        id = %entry.id,
                        blob_type = %entry.blob_type,
                        "blob store returned the same blob id twice"
                    );
                    return Err(BlobCacheError::corrupted(format!(
                        "blob id {} is not unique",
                        entry.id
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&entry));
                }
            }
            if entry.is_valid_at(now, state) {
                by_type.entry(entry.blob_type).or_default().push(entry);
            }
        }

        // Listing order is not trusted.
        for list in by_type.values_mut() {
            list.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        }

        Ok(Self {
            sequence,
            by_id,
            by_type,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of indexed blobs, valid or not.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of blobs that were valid at build time.
    pub fn valid_len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    /// Any blob with the given id, regardless of its validity.
    pub fn by_id(&self, id: BlobId) -> Option<&Arc<BlobEntry>> {
        self.by_id.get(&id)
    }

    /// Blobs of `blob_type` that are still valid at `now`, newest first.
    pub fn valid_of_type<'a>(
        &'a self,
        blob_type: BlobType,
        now: OffsetDateTime,
        state: &'a PlatformState,
    ) -> impl Iterator<Item = &'a Arc<BlobEntry>> + 'a {
        self.by_type
            .get(&blob_type)
            .into_iter()
            .flatten()
            .filter(move |entry| entry.is_valid_at(now, state))
    }
}
