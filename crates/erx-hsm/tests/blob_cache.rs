mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{CountingStore, ManualClock, blob};
use erx_core::{BlobName, BlobType, ErpBlob, NewBlobEntry, PlatformState};
use erx_hsm::{BlobCache, BlobCacheConfig, BlobCacheError, BoxError};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

fn config() -> BlobCacheConfig {
    BlobCacheConfig::default().with_refresh_interval(std::time::Duration::ZERO)
}

async fn cache_over(store: &Arc<CountingStore>) -> BlobCache {
    let cache = BlobCache::new(store.clone(), &config());
    cache.rebuild().await.unwrap();
    cache
}

#[tokio::test]
async fn ecies_keys_are_newest_first() {
    let store = CountingStore::new();
    let oldest = store.add(blob(BlobType::EciesKeypair, "ecies-1")).await;
    let middle = store.add(blob(BlobType::EciesKeypair, "ecies-2")).await;
    let newest = store.add(blob(BlobType::EciesKeypair, "ecies-3")).await;
    let cache = cache_over(&store).await;

    let keys = cache.get_ecies_keys().await.unwrap();
    assert_eq!(keys.latest.id, newest);
    assert_eq!(keys.fallback.as_ref().map(|e| e.id), Some(middle));
    assert_ne!(keys.latest.id, oldest);

    let by_type = cache.get_by_type(BlobType::EciesKeypair).await.unwrap();
    assert_eq!(by_type.id, newest);
}

#[tokio::test]
async fn single_ecies_key_has_no_fallback() {
    let store = CountingStore::new();
    store.add(blob(BlobType::EciesKeypair, "only")).await;
    let cache = cache_over(&store).await;

    let keys = cache.get_ecies_keys().await.unwrap();
    assert_eq!(keys.latest.name, BlobName::from("only"));
    assert!(keys.fallback.is_none());
}

#[tokio::test]
async fn hits_do_not_touch_the_store() {
    let store = CountingStore::new();
    let id = store.add(blob(BlobType::VauSig, "sig")).await;
    let cache = cache_over(&store).await;
    let lists = store.lists();

    for _ in 0..5 {
        cache.get_by_type(BlobType::VauSig).await.unwrap();
        cache.get_by_id(id).await.unwrap();
    }
    assert_eq!(store.lists(), lists);
}

#[tokio::test]
async fn miss_rebuilds_once_and_finds_foreign_insert() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;
    let lists = store.lists();

    // Another instance adds the blob; this cache has not seen it yet.
    let id = store.add(blob(BlobType::TaskKeyDerivation, "task")).await;

    let entry = cache.get_by_type(BlobType::TaskKeyDerivation).await.unwrap();
    assert_eq!(entry.id, id);
    assert_eq!(store.lists(), lists + 1);
}

#[tokio::test]
async fn missing_blob_is_not_found_after_one_rebuild() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;
    let lists = store.lists();
    let version = cache.snapshot_version();

    let err = cache.get_by_type(BlobType::KvnrHashKey).await.unwrap_err();
    assert!(matches!(err, BlobCacheError::NotFound { .. }));
    assert_eq!(err.status_code(), 404);
    assert_eq!(store.lists(), lists + 1);
    assert_eq!(cache.snapshot_version(), version + 1);
}

#[tokio::test]
async fn stored_blob_is_visible_immediately() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;

    let id = cache
        .store(blob(BlobType::CommunicationKeyDerivation, "comm"))
        .await
        .unwrap();
    let lists = store.lists();

    let entry = cache
        .get_by_type_and_id(BlobType::CommunicationKeyDerivation, id)
        .await
        .unwrap();
    assert_eq!(entry.blob.data, b"comm".to_vec());
    assert_eq!(store.lists(), lists, "store already rebuilt the snapshot");
}

#[tokio::test]
async fn store_conflict_is_passed_through() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;
    cache.store(blob(BlobType::VauAut, "aut")).await.unwrap();

    let err = cache.store(blob(BlobType::VauAut, "aut")).await.unwrap_err();
    assert!(matches!(err, BlobCacheError::Storage(ref e) if e.is_conflict()));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn store_rejects_inconsistent_entry() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;
    let now = OffsetDateTime::now_utc();

    let entry = blob(BlobType::VauAut, "aut")
        .with_valid_from(now + Duration::days(2))
        .with_valid_until(now + Duration::days(1));
    let err = cache.store(entry).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn deleted_blob_disappears() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;
    let id = cache.store(blob(BlobType::Quote, "quote")).await.unwrap();

    cache
        .delete(BlobType::Quote, &BlobName::from("quote"))
        .await
        .unwrap();

    let err = cache
        .get_by_type_and_id(BlobType::Quote, id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = cache
        .delete(BlobType::Quote, &BlobName::from("quote"))
        .await
        .unwrap_err();
    assert!(matches!(err, BlobCacheError::Storage(ref e) if e.is_not_found()));
}

#[tokio::test]
async fn lookup_by_id_checks_type_but_not_validity() {
    let store = CountingStore::new();
    let expired = store
        .add(
            blob(BlobType::VauSigPrivateKey, "old")
                .with_valid_until(OffsetDateTime::now_utc() - Duration::days(1)),
        )
        .await;
    let cache = cache_over(&store).await;

    let entry = cache
        .get_by_type_and_id(BlobType::VauSigPrivateKey, expired)
        .await
        .unwrap();
    assert_eq!(entry.id, expired);
    assert!(cache.get_by_id(expired).await.is_ok());

    assert!(
        cache
            .get_by_type_and_id(BlobType::VauSig, expired)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        cache
            .get_by_type(BlobType::VauSigPrivateKey)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn platform_state_gates_bound_blobs() {
    let store = CountingStore::new();
    let bound = store
        .add(
            blob(BlobType::AuditLogKeyDerivation, "audit")
                .with_required_platform_state(PlatformState::new(vec![1])),
        )
        .await;
    let config = config().with_platform_state(PlatformState::new(vec![2]));
    let cache = BlobCache::new(store.clone(), &config);
    cache.rebuild().await.unwrap();

    let err = cache
        .get_by_type(BlobType::AuditLogKeyDerivation)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    assert!(cache.set_platform_state(PlatformState::new(vec![1])).await.unwrap());
    let entry = cache
        .get_by_type(BlobType::AuditLogKeyDerivation)
        .await
        .unwrap();
    assert_eq!(entry.id, bound);

    let version = cache.snapshot_version();
    assert!(!cache.set_platform_state(PlatformState::new(vec![1])).await.unwrap());
    assert_eq!(cache.snapshot_version(), version, "unchanged state does not rebuild");
    assert_eq!(cache.platform_state().await, PlatformState::new(vec![1]));
}

#[tokio::test]
async fn leaving_a_platform_state_hides_its_bound_blobs() {
    let store = CountingStore::new();
    let unbound = store.add(blob(BlobType::VauAut, "unbound")).await;
    let bound = store
        .add(blob(BlobType::VauAut, "bound").with_required_platform_state(PlatformState::new(vec![1])))
        .await;
    store
        .add(
            blob(BlobType::KvnrHashKey, "bound-only")
                .with_required_platform_state(PlatformState::new(vec![1])),
        )
        .await;
    let config = config().with_platform_state(PlatformState::new(vec![1]));
    let cache = BlobCache::new(store.clone(), &config);
    cache.rebuild().await.unwrap();

    assert_eq!(cache.get_by_type(BlobType::VauAut).await.unwrap().id, bound);
    cache.get_by_type(BlobType::KvnrHashKey).await.unwrap();

    assert!(cache.set_platform_state(PlatformState::new(vec![2])).await.unwrap());

    assert_eq!(cache.get_by_type(BlobType::VauAut).await.unwrap().id, unbound);
    let err = cache.get_by_type(BlobType::KvnrHashKey).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn entries_aging_out_are_skipped_at_lookup_time() {
    let base = OffsetDateTime::now_utc();
    let clock = ManualClock::new(base);
    let store = CountingStore::new();
    let long_lived = store.add(blob(BlobType::ChargeItemKeyDerivation, "long")).await;
    store
        .add(
            blob(BlobType::ChargeItemKeyDerivation, "short")
                .with_valid_until(base + Duration::seconds(10)),
        )
        .await;
    let short_only = store
        .add(blob(BlobType::TelematikIdHashKey, "short").with_valid_until(base + Duration::seconds(10)))
        .await;

    let cache = BlobCache::with_clock(store.clone(), &config(), clock.clock());
    cache.rebuild().await.unwrap();
    assert_eq!(
        cache.get_by_type(BlobType::TelematikIdHashKey).await.unwrap().id,
        short_only
    );

    clock.advance(60);
    let lists = store.lists();

    let entry = cache
        .get_by_type(BlobType::ChargeItemKeyDerivation)
        .await
        .unwrap();
    assert_eq!(entry.id, long_lived);
    assert_eq!(store.lists(), lists, "an older valid entry is still a hit");

    let err = cache
        .get_by_type(BlobType::TelematikIdHashKey)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.lists(), lists + 1);
}

#[tokio::test]
async fn duplicate_ids_are_an_internal_error() {
    let store = CountingStore::new();
    store.add(blob(BlobType::PseudonameKey, "p")).await;
    let cache = cache_over(&store).await;
    let version = cache.snapshot_version();

    store.set_duplicate_ids(true);
    let err = cache.rebuild().await.unwrap_err();
    assert!(matches!(err, BlobCacheError::Corrupted { .. }));
    assert_eq!(err.status_code(), 500);
    assert_eq!(cache.snapshot_version(), version);

    // The previous snapshot keeps serving.
    cache.get_by_type(BlobType::PseudonameKey).await.unwrap();
}

#[tokio::test]
async fn store_failure_during_miss_propagates() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;

    store.set_fail_lists(true);
    let err = cache.get_by_type(BlobType::Quote).await.unwrap_err();
    assert!(matches!(err, BlobCacheError::Storage(_)));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn passthroughs_do_not_touch_the_snapshot() {
    let store = CountingStore::new();
    store.add(blob(BlobType::EndorsementKey, "ek")).await;
    store
        .add(
            blob(BlobType::AttestationPublicKey, "ak")
                .with_valid_until(OffsetDateTime::now_utc() - Duration::hours(1)),
        )
        .await;
    let cache = BlobCache::new(store.clone(), &config());

    let all = cache.list_all_sorted_by_id().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].id < all[1].id);

    let valid = cache
        .has_valid_of_type(&[BlobType::EndorsementKey, BlobType::AttestationPublicKey])
        .await
        .unwrap();
    assert_eq!(valid, vec![true, false]);
    assert_eq!(cache.snapshot_version(), 0);
}

#[tokio::test]
async fn attestation_key_pair_requires_active_enrolment() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;

    let err = cache
        .get_attestation_key_pair(false, || async { Ok::<_, BoxError>(ErpBlob::new(vec![1, 2, 3], 4)) })
        .await
        .unwrap_err();
    assert!(matches!(err, BlobCacheError::AttestationKeyPairUnavailable));
    assert_eq!(err.status_code(), 400);
    assert!(store.inner.is_empty().await);
}

#[tokio::test]
async fn attestation_key_pair_is_created_once() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;
    let created = Arc::new(AtomicUsize::new(0));

    let provider = |created: Arc<AtomicUsize>| {
        move || async move {
            created.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(ErpBlob::new(b"attestation key pair".to_vec(), 4))
        }
    };

    let first = cache
        .get_attestation_key_pair(true, provider(created.clone()))
        .await
        .unwrap();
    assert_eq!(first.blob_type, BlobType::AttestationKeyPair);
    assert_eq!(
        first.name.as_bytes(),
        Sha256::digest(b"attestation key pair").as_slice()
    );

    let second = cache
        .get_attestation_key_pair(false, provider(created.clone()))
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn attestation_provider_failure_is_reported() {
    let store = CountingStore::new();
    let cache = cache_over(&store).await;

    let err = cache
        .get_attestation_key_pair(true, || async { Err::<ErpBlob, BoxError>("hsm offline".into()) })
        .await
        .unwrap_err();
    assert!(matches!(err, BlobCacheError::AttestationKeyCreation { .. }));
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn cold_cache_finds_stored_attestation_key_pair() {
    let store = CountingStore::new();
    let existing = store
        .add(NewBlobEntry::new(
            BlobType::AttestationKeyPair,
            "existing",
            ErpBlob::new(b"existing key pair".to_vec(), 4),
        ))
        .await;
    let cache = BlobCache::new(store.clone(), &config());

    let entry = cache
        .get_attestation_key_pair(false, || async { Ok::<_, BoxError>(ErpBlob::new(vec![9], 4)) })
        .await
        .unwrap();
    assert_eq!(entry.id, existing);

    let cache = BlobCache::new(store.clone(), &config());
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let entry = cache
        .get_attestation_key_pair(true, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(ErpBlob::new(vec![9], 4))
        })
        .await
        .unwrap();
    assert_eq!(entry.id, existing);
    assert_eq!(created.load(Ordering::SeqCst), 0);
    assert_eq!(store.inner.len().await, 1);
}
