//! Conversion between blob table rows and domain types.

use chrono::{DateTime, Utc};
use erx_core::{BlobEntry, BlobId, BlobMetadata, BlobName, BlobType, ErpBlob, PlatformState};
use erx_storage::StorageError;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::warn;

/// Columns selected for a blob, in `SELECT_COLUMNS` order.
pub(crate) type BlobRow = (
    i64,
    i16,
    Vec<u8>,
    Vec<u8>,
    i64,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<Vec<u8>>,
    Option<Value>,
);

pub(crate) const SELECT_COLUMNS: &str =
    "blob_id, type, name, data, generation, valid_from, valid_until, platform_state, meta";

/// Converts chrono DateTime to time OffsetDateTime.
///
/// `timestamptz` reaches further than `OffsetDateTime`; such bounds are an
/// error rather than being clamped.
pub(crate) fn chrono_to_time(dt: DateTime<Utc>) -> Result<OffsetDateTime, StorageError> {
    let nanos = i128::from(dt.timestamp()) * 1_000_000_000 + i128::from(dt.timestamp_subsec_nanos());
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|e| StorageError::internal(format!("stored timestamp {dt} is out of range: {e}")))
}

/// Converts time OffsetDateTime to chrono DateTime.
pub(crate) fn time_to_chrono(t: OffsetDateTime) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp(t.unix_timestamp(), t.nanosecond())
        .ok_or_else(|| StorageError::invalid_blob(format!("timestamp {t} is out of range")))
}

pub(crate) fn entry_from_row(row: BlobRow) -> Result<BlobEntry, StorageError> {
    let (id, type_code, name, data, generation, valid_from, valid_until, platform_state, meta) =
        row;

    let id = BlobId::try_from(id).map_err(|e| StorageError::internal(e.to_string()))?;
    let blob_type =
        BlobType::from_code(type_code).map_err(|e| StorageError::internal(e.to_string()))?;
    let generation = u32::try_from(generation).map_err(|_| {
        StorageError::internal(format!("blob {id} has invalid generation {generation}"))
    })?;

    Ok(BlobEntry {
        id,
        blob_type,
        name: BlobName::new(name),
        blob: ErpBlob::new(data, generation),
        valid_from: valid_from.map(chrono_to_time).transpose()?,
        valid_until: valid_until.map(chrono_to_time).transpose()?,
        required_platform_state: platform_state.map(PlatformState::new),
        metadata: metadata_from_json(id, meta),
    })
}

/// Parses the `meta` column. Malformed metadata is logged and ignored.
pub(crate) fn metadata_from_json(id: BlobId, meta: Option<Value>) -> BlobMetadata {
    let Some(meta) = meta else {
        return BlobMetadata::default();
    };
    match serde_json::from_value(meta) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(id = %id, error = %e, "ignoring malformed blob metadata");
            BlobMetadata::default()
        }
    }
}

pub(crate) fn metadata_to_json(metadata: &BlobMetadata) -> Result<Option<Value>, StorageError> {
    if metadata.is_empty() {
        return Ok(None);
    }
    serde_json::to_value(metadata)
        .map(Some)
        .map_err(|e| StorageError::invalid_blob(format!("unserializable metadata: {e}")))
}
