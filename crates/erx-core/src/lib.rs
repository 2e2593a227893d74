//! # erx-core
//!
//! Domain types for HSM-issued blobs: categories, identities, payloads,
//! validity windows and the platform state some blobs are bound to.

pub mod blob;
pub mod entry;
pub mod error;
pub mod platform;

pub use blob::{BlobId, BlobMetadata, BlobName, BlobType, ErpBlob};
pub use entry::{BlobEntry, NewBlobEntry, is_within_window};
pub use error::{CoreError, Result};
pub use platform::PlatformState;
