mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{CountingStore, blob};
use erx_core::BlobType;
use erx_hsm::{BlobCache, BlobCacheConfig, BlobCacheError};
use tokio::time::sleep;

const INTERVAL: Duration = Duration::from_secs(60);

async fn started_cache(store: &Arc<CountingStore>) -> Arc<BlobCache> {
    let config = BlobCacheConfig::default().with_refresh_interval(INTERVAL);
    BlobCache::start(store.clone(), &config).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn scheduled_refresh_picks_up_foreign_changes() {
    let store = CountingStore::new();
    let cache = started_cache(&store).await;
    assert_eq!(cache.snapshot_version(), 1);

    store.add(blob(BlobType::VauSig, "sig")).await;
    sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(cache.snapshot_version(), 2);

    let lists = store.lists();
    cache.get_by_type(BlobType::VauSig).await.unwrap();
    assert_eq!(store.lists(), lists, "refresh already loaded the blob");

    cache.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_does_not_stop_the_timer() {
    let store = CountingStore::new();
    let cache = started_cache(&store).await;

    store.set_fail_lists(true);
    sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
    assert_eq!(store.lists(), 3);
    assert_eq!(cache.snapshot_version(), 1);

    store.set_fail_lists(false);
    sleep(INTERVAL).await;
    assert_eq!(cache.snapshot_version(), 2);

    cache.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn refresh_can_only_be_started_once() {
    let store = CountingStore::new();
    let cache = started_cache(&store).await;

    let err = cache.start_background_refresh(INTERVAL).await.unwrap_err();
    assert!(matches!(err, BlobCacheError::RefreshAlreadyStarted));

    cache.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_refresh() {
    let store = CountingStore::new();
    let cache = started_cache(&store).await;
    cache.shutdown().await.unwrap();

    let lists = store.lists();
    sleep(INTERVAL * 5).await;
    assert_eq!(store.lists(), lists);

    // A second shutdown is a no-op.
    cache.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn disabled_refresh_never_runs() {
    let store = CountingStore::new();
    let config = BlobCacheConfig::default().with_refresh_interval(Duration::ZERO);
    let cache = BlobCache::start(store.clone(), &config).await.unwrap();

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(store.lists(), 1);
    assert_eq!(cache.snapshot_version(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_cache_ends_the_refresh() {
    let store = CountingStore::new();
    let cache = started_cache(&store).await;
    drop(cache);

    let lists = store.lists();
    sleep(INTERVAL * 3).await;
    assert_eq!(store.lists(), lists);
}

#[tokio::test(start_paused = true)]
async fn zero_refresh_interval_is_rejected() {
    let store = CountingStore::new();
    let cache = Arc::new(BlobCache::new(store.clone(), &BlobCacheConfig::default()));

    let err = cache
        .start_background_refresh(Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, BlobCacheError::ZeroRefreshInterval));

    // The rejected call does not count as a start.
    cache.start_background_refresh(INTERVAL).await.unwrap();
    cache.shutdown().await.unwrap();
}
