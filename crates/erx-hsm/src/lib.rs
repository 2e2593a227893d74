//! # erx-hsm
//!
//! HSM blob handling for the processing context.
//!
//! The [`BlobCache`] keeps the blobs of a shared [`erx_storage::BlobStore`]
//! indexed by id and by type, serves the newest valid blob of a type, and
//! reloads itself on misses, after writes and on a schedule.

pub mod cache;
pub mod config;
pub mod error;
pub mod refresh;
pub mod snapshot;

pub use cache::{BlobCache, Clock, EciesKeys};
pub use config::BlobCacheConfig;
pub use error::{BlobCacheError, BoxError};
pub use refresh::BlobCacheRefresher;
pub use snapshot::BlobSnapshot;
