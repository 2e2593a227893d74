//! Stored blob records and their validity rules.

use time::OffsetDateTime;

use crate::blob::{BlobId, BlobMetadata, BlobName, BlobType, ErpBlob};
use crate::platform::PlatformState;

/// A blob that has not been stored yet and therefore has no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlobEntry {
    pub blob_type: BlobType,
    pub name: BlobName,
    pub blob: ErpBlob,
    /// Start of the validity window; `None` is unbounded.
    pub valid_from: Option<OffsetDateTime>,
    /// End of the validity window (inclusive); `None` is unbounded.
    pub valid_until: Option<OffsetDateTime>,
    /// Platform state that must be configured for this blob to be usable.
    pub required_platform_state: Option<PlatformState>,
    pub metadata: BlobMetadata,
}

impl NewBlobEntry {
    pub fn new(blob_type: BlobType, name: impl Into<BlobName>, blob: ErpBlob) -> Self {
        Self {
            blob_type,
            name: name.into(),
            blob,
            valid_from: None,
            valid_until: None,
            required_platform_state: None,
            metadata: BlobMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_valid_from(mut self, valid_from: OffsetDateTime) -> Self {
        self.valid_from = Some(valid_from);
        self
    }

    #[must_use]
    pub fn with_valid_until(mut self, valid_until: OffsetDateTime) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    #[must_use]
    pub fn with_required_platform_state(mut self, state: PlatformState) -> Self {
        self.required_platform_state = Some(state);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: BlobMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Describes why this entry cannot be stored, if it cannot.
    pub fn consistency_error(&self) -> Option<String> {
        if self.name.is_empty() {
            return Some(format!("blob of type {} has an empty name", self.blob_type));
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until)
            && from > until
        {
            return Some(format!(
                "blob '{}' of type {} becomes valid after it expires",
                self.name, self.blob_type
            ));
        }
        None
    }
}

/// A stored blob as returned by the blob store and served by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub id: BlobId,
    pub blob_type: BlobType,
    pub name: BlobName,
    pub blob: ErpBlob,
    pub valid_from: Option<OffsetDateTime>,
    pub valid_until: Option<OffsetDateTime>,
    pub required_platform_state: Option<PlatformState>,
    pub metadata: BlobMetadata,
}

impl BlobEntry {
    /// Attach a store-assigned id to a new entry.
    pub fn from_new(id: BlobId, entry: NewBlobEntry) -> Self {
        Self {
            id,
            blob_type: entry.blob_type,
            name: entry.name,
            blob: entry.blob,
            valid_from: entry.valid_from,
            valid_until: entry.valid_until,
            required_platform_state: entry.required_platform_state,
            metadata: entry.metadata,
        }
    }

    /// Whether `now` lies inside the validity window (both bounds inclusive).
    pub fn is_time_valid_at(&self, now: OffsetDateTime) -> bool {
        is_within_window(self.valid_from, self.valid_until, now)
    }

    /// Whether this blob may be used at `now` on a platform in `state`.
    pub fn is_valid_at(&self, now: OffsetDateTime, state: &PlatformState) -> bool {
        self.is_time_valid_at(now)
            && self
                .required_platform_state
                .as_ref()
                .is_none_or(|required| required == state)
    }
}

/// Shared window check for stores that only see the validity columns.
pub fn is_within_window(
    valid_from: Option<OffsetDateTime>,
    valid_until: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> bool {
    valid_from.is_none_or(|from| now >= from) && valid_until.is_none_or(|until| now <= until)
}
