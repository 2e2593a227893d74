//! Builds the blob store and cache described by an [`AppConfig`].

use std::sync::Arc;

use erx_db_memory::InMemoryBlobStore;
use erx_db_postgres::PostgresBlobStore;
use erx_hsm::{BlobCache, BlobCacheError};
use erx_storage::{DynBlobStore, StorageError};
use tracing::info;

use crate::settings::{AppConfig, StorageBackend, StorageSettings};

/// Creates the configured blob store.
///
/// # Errors
///
/// Returns an error if the PostgreSQL store cannot connect or create its schema.
pub async fn build_blob_store(settings: &StorageSettings) -> Result<DynBlobStore, StorageError> {
    let store: DynBlobStore = match settings.backend {
        StorageBackend::Memory => Arc::new(InMemoryBlobStore::new()),
        StorageBackend::Postgres => Arc::new(PostgresBlobStore::new(&settings.postgres).await?),
    };
    info!(backend = store.backend_name(), "blob store ready");
    Ok(store)
}

/// Creates the store and a loaded blob cache, with background refresh as configured.
///
/// # Errors
///
/// Returns an error if the store cannot be created or the first load fails.
pub async fn start_blob_cache(config: &AppConfig) -> Result<Arc<BlobCache>, BlobCacheError> {
    let store = build_blob_store(&config.storage).await?;
    let cache = BlobCache::start(store, &config.blob_cache).await?;
    info!(
        refresh_interval_secs = config.blob_cache.refresh_interval_secs,
        platform_state = %config.blob_cache.platform_state,
        "blob cache started"
    );
    Ok(cache)
}
