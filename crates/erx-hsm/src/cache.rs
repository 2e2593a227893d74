//! Blob cache in front of a shared, externally modified blob store.
//!
//! Lookups are served from an immutable snapshot of the store. A lookup that
//! misses reloads the snapshot exactly once before giving up, so blobs added
//! by other instances become visible on first use. Writes through the cache
//! always reload, and an optional background task reloads periodically so
//! that expiring blobs are evicted before they are required.
//!
//! # Example
//!
//! ```ignore
//! use erx_hsm::{BlobCache, BlobCacheConfig};
//!
//! let cache = BlobCache::start(store, BlobCacheConfig::default()).await?;
//! let keys = cache.get_ecies_keys().await?;
//! // ...
//! cache.shutdown().await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use erx_core::{BlobEntry, BlobId, BlobName, BlobType, ErpBlob, NewBlobEntry, PlatformState};
use erx_scheduler::PeriodicTimer;
use erx_storage::DynBlobStore;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::BlobCacheConfig;
use crate::error::{BlobCacheError, BoxError};
use crate::refresh::BlobCacheRefresher;
use crate::snapshot::BlobSnapshot;

/// Source of the current time for validity checks.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// The newest ECIES key pair and, if there is one, its predecessor.
#[derive(Debug, Clone)]
pub struct EciesKeys {
    pub latest: Arc<BlobEntry>,
    pub fallback: Option<Arc<BlobEntry>>,
}

// =============================================================================
// Blob Cache
// =============================================================================

/// Cache of HSM blobs.
///
/// Shared as `Arc<BlobCache>`. All store access goes through one logical
/// store session; the snapshot lock is never held while the store is used.
pub struct BlobCache {
    store: DynBlobStore,

    /// Serializes store access.
    store_session: Mutex<()>,

    /// Number of listings taken, assigned under `store_session`.
    listings: AtomicU64,

    snapshot: RwLock<Arc<BlobSnapshot>>,

    platform_state: RwLock<PlatformState>,

    /// Successful snapshot swaps.
    rebuilds: AtomicU64,

    refresh_started: AtomicBool,
    refresher: Mutex<Option<PeriodicTimer<BlobCacheRefresher>>>,

    clock: Clock,
}

impl BlobCache {
    /// Creates an empty cache. The first lookup loads the snapshot.
    pub fn new(store: DynBlobStore, config: &BlobCacheConfig) -> Self {
        Self::with_clock(store, config, Arc::new(OffsetDateTime::now_utc))
    }

    /// Creates an empty cache that judges validity by `clock`.
    pub fn with_clock(store: DynBlobStore, config: &BlobCacheConfig, clock: Clock) -> Self {
        Self {
            store,
            store_session: Mutex::new(()),
            listings: AtomicU64::new(0),
            snapshot: RwLock::new(Arc::new(BlobSnapshot::default())),
            platform_state: RwLock::new(config.platform_state.clone()),
            rebuilds: AtomicU64::new(0),
            refresh_started: AtomicBool::new(false),
            refresher: Mutex::new(None),
            clock,
        }
    }

    /// Creates a cache, loads the initial snapshot and starts the background
    /// refresh if `config` enables it.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial load fails.
    pub async fn start(
        store: DynBlobStore,
        config: &BlobCacheConfig,
    ) -> Result<Arc<Self>, BlobCacheError> {
        let cache = Arc::new(Self::new(store, config));
        cache.rebuild().await?;
        if let Some(interval) = config.refresh_interval() {
            cache.start_background_refresh(interval).await?;
        }
        Ok(cache)
    }

    // ===== Lookups =====

    /// The newest blob of `blob_type` that is valid now.
    ///
    /// # Errors
    ///
    /// Returns `BlobCacheError::NotFound` if there is none, even after reloading.
    pub async fn get_by_type(&self, blob_type: BlobType) -> Result<Arc<BlobEntry>, BlobCacheError> {
        self.lookup(
            || format!("no valid blob of type {blob_type}"),
            |snapshot, now, state| snapshot.valid_of_type(blob_type, now, state).next().cloned(),
        )
        .await
    }

    /// The blob with `id`, provided it has type `blob_type`. Validity is not
    /// checked, so callers can still use a blob they referenced earlier.
    ///
    /// # Errors
    ///
    /// Returns `BlobCacheError::NotFound` if there is none, even after reloading.
    pub async fn get_by_type_and_id(
        &self,
        blob_type: BlobType,
        id: BlobId,
    ) -> Result<Arc<BlobEntry>, BlobCacheError> {
        self.lookup(
            || format!("no blob of type {blob_type} with id {id}"),
            |snapshot, _, _| {
                snapshot
                    .by_id(id)
                    .filter(|entry| entry.blob_type == blob_type)
                    .cloned()
            },
        )
        .await
    }

    /// The blob with `id`, of any type and regardless of validity.
    ///
    /// # Errors
    ///
    /// Returns `BlobCacheError::NotFound` if there is none, even after reloading.
    pub async fn get_by_id(&self, id: BlobId) -> Result<Arc<BlobEntry>, BlobCacheError> {
        self.lookup(
            || format!("no blob with id {id}"),
            |snapshot, _, _| snapshot.by_id(id).cloned(),
        )
        .await
    }

    /// The newest valid ECIES key pair plus the one before it.
    ///
    /// # Errors
    ///
    /// Returns `BlobCacheError::NotFound` if there is no valid ECIES key pair.
    pub async fn get_ecies_keys(&self) -> Result<EciesKeys, BlobCacheError> {
        self.lookup(
            || format!("no valid blob of type {}", BlobType::EciesKeypair),
            |snapshot, now, state| {
                let mut valid = snapshot.valid_of_type(BlobType::EciesKeypair, now, state);
                let latest = Arc::clone(valid.next()?);
                Some(EciesKeys {
                    latest,
                    fallback: valid.next().cloned(),
                })
            },
        )
        .await
    }

    /// The attestation key pair, created on demand while enrolment is active.
    ///
    /// A new key pair is obtained from `provider` and stored under the
    /// SHA-256 hash of its data.
    ///
    /// # Errors
    ///
    /// Returns `BlobCacheError::AttestationKeyPairUnavailable` if the key
    /// pair is missing and `enrolment_active` is false. Store errors and
    /// provider failures are passed on.
    pub async fn get_attestation_key_pair<F, Fut>(
        &self,
        enrolment_active: bool,
        provider: F,
    ) -> Result<Arc<BlobEntry>, BlobCacheError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<ErpBlob, BoxError>> + Send,
    {
        let newest = |snapshot: &BlobSnapshot, now: OffsetDateTime, state: &PlatformState| {
            snapshot
                .valid_of_type(BlobType::AttestationKeyPair, now, state)
                .next()
                .cloned()
        };

        if let Some(entry) = self.find(newest).await {
            return Ok(entry);
        }
        debug!("attestation key pair not cached, rebuilding");
        self.rebuild().await?;
        if let Some(entry) = self.find(newest).await {
            return Ok(entry);
        }
        if !enrolment_active {
            return Err(BlobCacheError::AttestationKeyPairUnavailable);
        }

        warn!("creating a new attestation key pair");
        let blob = provider()
            .await
            .map_err(|source| BlobCacheError::AttestationKeyCreation { source })?;
        let name = BlobName::new(Sha256::digest(&blob.data).to_vec());
        self.store(NewBlobEntry::new(BlobType::AttestationKeyPair, name, blob))
            .await?;

        self.find(newest)
            .await
            .ok_or_else(|| BlobCacheError::internal("did not create attestation key pair blob"))
    }

    async fn lookup<T>(
        &self,
        describe: impl FnOnce() -> String,
        find: impl Fn(&BlobSnapshot, OffsetDateTime, &PlatformState) -> Option<T>,
    ) -> Result<T, BlobCacheError> {
        if let Some(found) = self.find(&find).await {
            return Ok(found);
        }

        let what = describe();
        debug!(lookup = %what, "blob cache miss, rebuilding");
        self.rebuild().await?;

        self.find(&find)
            .await
            .ok_or_else(|| BlobCacheError::not_found(what))
    }

    async fn find<T>(
        &self,
        find: impl Fn(&BlobSnapshot, OffsetDateTime, &PlatformState) -> Option<T>,
    ) -> Option<T> {
        let state = self.platform_state.read().await.clone();
        let snapshot = self.snapshot.read().await;
        find(&snapshot, (self.clock)(), &state)
    }

    // ===== Writes =====

    /// Stores a new blob and reloads the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or an error from the reload.
    #[instrument(skip(self, entry), fields(blob_type = %entry.blob_type, name = %entry.name))]
    pub async fn store(&self, entry: NewBlobEntry) -> Result<BlobId, BlobCacheError> {
        let id = {
            let _session = self.store_session.lock().await;
            self.store.insert(entry).await?
        };
        debug!(id = %id, "stored blob");
        self.rebuild().await?;
        Ok(id)
    }

    /// Deletes a blob and reloads the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or an error from the reload.
    #[instrument(skip(self, name), fields(name = %name))]
    pub async fn delete(&self, blob_type: BlobType, name: &BlobName) -> Result<(), BlobCacheError> {
        {
            let _session = self.store_session.lock().await;
            self.store.delete(blob_type, name).await?;
        }
        debug!("deleted blob");
        self.rebuild().await
    }

    /// Replaces the platform state. Reloads the snapshot if the value changed.
    ///
    /// Returns whether the state changed.
    ///
    /// # Errors
    ///
    /// Returns an error from the reload.
    pub async fn set_platform_state(&self, state: PlatformState) -> Result<bool, BlobCacheError> {
        {
            let mut current = self.platform_state.write().await;
            if *current == state {
                return Ok(false);
            }
            info!(old = %current.to_hex(), new = %state, "platform state changed");
            *current = state;
        }
        self.rebuild().await?;
        Ok(true)
    }

    pub async fn platform_state(&self) -> PlatformState {
        self.platform_state.read().await.clone()
    }

    // ===== Store passthrough =====

    /// Lists the store directly, bypassing the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn list_all_sorted_by_id(&self) -> Result<Vec<BlobEntry>, BlobCacheError> {
        let _session = self.store_session.lock().await;
        Ok(self.store.list_all_sorted_by_id().await?)
    }

    /// Asks the store, for every type, whether it holds a time-valid blob.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn has_valid_of_type(&self, types: &[BlobType]) -> Result<Vec<bool>, BlobCacheError> {
        let _session = self.store_session.lock().await;
        Ok(self.store.has_valid_of_type(types).await?)
    }

    // ===== Rebuild =====

    /// Reloads the snapshot from the store.
    ///
    /// A snapshot built from an older listing never replaces one built from
    /// a newer listing.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or `BlobCacheError::Corrupted` if the
    /// listing contains duplicate ids.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn rebuild(&self) -> Result<(), BlobCacheError> {
        let (sequence, entries) = {
            let _session = self.store_session.lock().await;
            let entries = self.store.list_all_sorted_by_id().await?;
            (self.listings.fetch_add(1, Ordering::SeqCst) + 1, entries)
        };

        let state = self.platform_state.read().await.clone();
        let snapshot = BlobSnapshot::build(sequence, entries, (self.clock)(), &state)?;
        let (total, valid) = (snapshot.len(), snapshot.valid_len());

        {
            let mut current = self.snapshot.write().await;
            if current.sequence() > sequence {
                debug!(sequence, "newer blob snapshot already installed");
                return Ok(());
            }
            *current = Arc::new(snapshot);
        }
        self.rebuilds.fetch_add(1, Ordering::SeqCst);

        debug!(total, valid, "blob cache rebuilt");
        Ok(())
    }

    /// Number of snapshots installed so far.
    pub fn snapshot_version(&self) -> u64 {
        self.rebuilds.load(Ordering::SeqCst)
    }

    // ===== Background refresh =====

    /// Starts reloading the snapshot every `interval`.
    ///
    /// Failed scheduled reloads are logged and do not stop the refresh.
    ///
    /// # Errors
    ///
    /// Returns `BlobCacheError::RefreshAlreadyStarted` on a second call and
    /// `BlobCacheError::ZeroRefreshInterval` if `interval` is zero.
    pub async fn start_background_refresh(
        self: &Arc<Self>,
        interval: Duration,
    ) -> Result<(), BlobCacheError> {
        if interval.is_zero() {
            return Err(BlobCacheError::ZeroRefreshInterval);
        }
        if self.refresh_started.swap(true, Ordering::SeqCst) {
            return Err(BlobCacheError::RefreshAlreadyStarted);
        }

        let mut timer = PeriodicTimer::new(BlobCacheRefresher::new(Arc::downgrade(self), interval));
        timer.start(interval)?;
        *self.refresher.lock().await = Some(timer);

        info!(interval_secs = interval.as_secs_f64(), "blob cache refresh started");
        Ok(())
    }

    /// Stops the background refresh, waiting for a reload in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh task failed.
    pub async fn shutdown(&self) -> Result<(), BlobCacheError> {
        let timer = self.refresher.lock().await.take();
        if let Some(timer) = timer {
            timer.cancel().await?;
            info!("blob cache refresh stopped");
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlobCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobCache")
            .field("backend", &self.store.backend_name())
            .field("snapshot_version", &self.snapshot_version())
            .field("refresh_started", &self.refresh_started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
