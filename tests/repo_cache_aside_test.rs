//! Cache-aside read path: coalescing, negative caching, empty shapes and
//! cache failure handling.

mod common;

use cache_aside::cache::{
    Cache, CacheError, CacheProvider, CacheService, CacheValue, MokaCacheService,
    NOT_FOUND_PLACEHOLDER,
};
use cache_aside::config::AppConfig;
use cache_aside::repo::{FetchError, Record, Records, Repo, RepoError, EMPTY_RECORDS_CAPACITY};
use cache_aside::resilience::{CircuitBreaker, CircuitBreakerConfig};
use common::stores::FlakyStore;
use common::{ada, moka_cache, moka_repo, User};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio_test::{assert_err, assert_ok};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_fetch_once_and_share_the_value() {
    let repo = moka_repo();
    let fetches = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(20));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let repo = repo.clone();
        let fetches = Arc::clone(&fetches);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut dest = Record::<User>::default();
            repo.query_with_cache("user:42", &mut dest, DAY, move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(Record::new(ada()))
            })
            .await
            .map(|()| dest)
        }));
    }

    for handle in handles {
        let dest = assert_ok!(handle.await.unwrap());
        assert_eq!(dest.into_inner(), ada());
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(repo.loads_in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_the_same_error() {
    let repo = moka_repo();
    let fetches = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        let fetches = Arc::clone(&fetches);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut dest = Records::<User>::default();
            repo.query_with_cache("users:all", &mut dest, DAY, move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(150)).await;
                Err(FetchError::other("connection refused"))
            })
            .await
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            Err(RepoError::Fetch { key, message }) => {
                assert_eq!(key, "users:all");
                assert_eq!(message, "connection refused");
            }
            other => panic!("expected shared fetch error, got {other:?}"),
        }
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn not_found_is_cached_and_short_circuits_later_reads() {
    let repo = moka_repo();
    let fetches = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let fetches = Arc::clone(&fetches);
        let mut dest = Record::new(ada());
        assert_ok!(
            repo.query_with_cache("user:7", &mut dest, DAY, move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Err::<Record<User>, _>(FetchError::NotFound)
            })
            .await
        );
        assert_eq!(dest.into_inner(), User::default());
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_shapes_are_never_unset() {
    let repo = moka_repo();

    let mut record = Record::new(ada());
    assert_ok!(
        repo.query_with_cache("single", &mut record, DAY, || async {
            Err::<Record<User>, _>(FetchError::NotFound)
        })
        .await
    );
    assert_eq!(*record, User::default());

    let mut untouched = Records::<User>::default();
    assert_ok!(
        repo.query_with_cache("many", &mut untouched, DAY, || async {
            Err::<Records<User>, _>(FetchError::EmptyResult)
        })
        .await
    );
    assert!(untouched.is_empty());
    assert!(untouched.capacity() >= EMPTY_RECORDS_CAPACITY);

    // negative hit path, with a destination that already holds data
    let mut stale = Records::new(vec![ada(), ada()]);
    assert_ok!(
        repo.query_with_cache("many", &mut stale, DAY, || async {
            Ok(Records::new(vec![ada()]))
        })
        .await
    );
    assert!(stale.is_empty());
}

#[tokio::test]
async fn user_42_not_found_stores_marker_with_negative_ttl() {
    let repo = moka_repo();
    let mut dest = Record::<User>::default();

    assert_ok!(
        repo.query_with_cache("user:42", &mut dest, DAY, || async {
            Err::<Record<User>, _>(FetchError::NotFound)
        })
        .await
    );
    assert_eq!(dest.into_inner(), User::default());

    let store = repo.cache().store();
    let raw = store.get("cache:user:42").await.unwrap();
    assert_eq!(raw.as_deref(), Some(NOT_FOUND_PLACEHOLDER));

    let ttl = store.ttl("cache:user:42").await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(60));
    assert!(ttl > Duration::from_secs(55));
}

#[tokio::test]
async fn negative_entry_masks_origin_until_it_expires() {
    let repo = Repo::new(moka_cache().with_not_found_ttl(Duration::from_millis(300)));
    let fetches = Arc::new(AtomicUsize::new(0));

    let mut dest = Record::<User>::default();
    assert_ok!(
        repo.query_with_cache("user:42", &mut dest, DAY, || async {
            Err::<Record<User>, _>(FetchError::NotFound)
        })
        .await
    );

    // the origin now has the user, but the marker is still live
    let counted = Arc::clone(&fetches);
    let mut dest = Record::<User>::default();
    assert_ok!(
        repo.query_with_cache("user:42", &mut dest, DAY, move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Record::new(ada()))
        })
        .await
    );
    assert_eq!(dest.into_inner(), User::default());
    assert_eq!(fetches.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let counted = Arc::clone(&fetches);
    let mut dest = Record::<User>::default();
    assert_ok!(
        repo.query_with_cache("user:42", &mut dest, DAY, move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Record::new(ada()))
        })
        .await
    );
    assert_eq!(dest.into_inner(), ada());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_ttl_uses_the_cache_default() {
    let repo = Repo::new(moka_cache().with_default_ttl(Duration::from_secs(3_600)));
    let mut dest = Record::<u32>::default();
    assert_ok!(
        repo.query_with_cache("n", &mut dest, Duration::ZERO, || async {
            Ok(Record::new(3))
        })
        .await
    );

    let ttl = repo.cache().remaining_ttl("n").await.unwrap().unwrap();
    assert!(ttl > Duration::from_secs(3_590));
}

#[tokio::test]
async fn cache_read_failure_propagates_with_key() {
    let store = FlakyStore::new();
    store.fail_reads(true);
    let repo = Repo::new(Cache::new(store));

    let mut dest = Record::<User>::default();
    let error = assert_err!(
        repo.query_with_cache("user:1", &mut dest, DAY, || async {
            Ok(Record::new(ada()))
        })
        .await
    );
    assert!(matches!(error, RepoError::CacheRead { ref key, .. } if key == "user:1"));
}

#[tokio::test]
async fn positive_write_failure_is_strict_by_default() {
    let store = FlakyStore::new();
    store.fail_writes(true);
    let repo = Repo::new(Cache::new(store));

    let mut dest = Record::<User>::default();
    let error = assert_err!(
        repo.query_with_cache("user:1", &mut dest, DAY, || async {
            Ok(Record::new(ada()))
        })
        .await
    );
    assert!(matches!(error, RepoError::CacheWrite { .. }));
}

#[tokio::test]
async fn lenient_mode_returns_value_when_write_fails() {
    let store = FlakyStore::new();
    store.fail_writes(true);
    let repo = Repo::new(Cache::new(store)).with_strict_cache_writes(false);

    let mut dest = Record::<User>::default();
    assert_ok!(
        repo.query_with_cache("user:1", &mut dest, DAY, || async {
            Ok(Record::new(ada()))
        })
        .await
    );
    assert_eq!(dest.into_inner(), ada());
}

#[tokio::test]
async fn marker_write_failure_does_not_fail_the_read() {
    let store = FlakyStore::new();
    store.fail_writes(true);
    let repo = Repo::new(Cache::new(store));

    let mut dest = Records::<User>::new(vec![ada()]);
    assert_ok!(
        repo.query_with_cache("users", &mut dest, DAY, || async {
            Err::<Records<User>, _>(FetchError::NotFound)
        })
        .await
    );
    assert!(dest.is_empty());
}

#[tokio::test]
async fn del_cache_never_fails() {
    let store = FlakyStore::new();
    let repo = Repo::new(Cache::new(store));

    let mut dest = Record::<u32>::default();
    assert_ok!(
        repo.query_with_cache("n", &mut dest, DAY, || async { Ok(Record::new(1)) })
            .await
    );

    repo.cache().store().fail_writes(true);
    repo.del_cache("n").await;
    repo.cache().store().fail_writes(false);

    // the failed invalidation left the entry in place
    assert_eq!(repo.cache().get::<u32>("n").await.unwrap(), CacheValue::Hit(1));

    repo.del_cache("n").await;
    assert_eq!(repo.cache().get::<u32>("n").await.unwrap(), CacheValue::Miss);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mismatched_destination_types_on_one_key_are_reported() {
    let repo = moka_repo();

    let single = {
        let repo = repo.clone();
        tokio::spawn(async move {
            let mut dest = Record::<User>::default();
            repo.query_with_cache("shared", &mut dest, DAY, || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Record::new(ada()))
            })
            .await
        })
    };

    while repo.loads_in_flight() == 0 {
        tokio::task::yield_now().await;
    }

    let mut many = Records::<User>::default();
    let result = repo
        .query_with_cache("shared", &mut many, DAY, || async {
            Ok(Records::new(vec![ada()]))
        })
        .await;

    assert!(matches!(result, Err(RepoError::ShapeMismatch { .. })));
    assert_ok!(single.await.unwrap());
}

#[tokio::test]
async fn abandoned_caller_still_populates_the_cache() {
    let repo = moka_repo();
    let fetches = Arc::new(AtomicUsize::new(0));

    let counted = Arc::clone(&fetches);
    let mut dest = Record::<User>::default();
    let waited = tokio::time::timeout(
        Duration::from_millis(20),
        repo.query_with_cache("slow", &mut dest, DAY, move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(Record::new(ada()))
        }),
    )
    .await;
    assert!(waited.is_err());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        repo.cache().get::<User>("slow").await.unwrap(),
        CacheValue::Hit(ada())
    );
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repo_from_default_config_uses_moka() {
    let repo = Repo::from_config(&AppConfig::default()).await;
    assert_eq!(repo.cache().store().provider_name(), "moka");
    assert_eq!(repo.cache().prefix(), "cache");

    let mut dest = Record::<User>::default();
    assert_ok!(
        repo.query_with_cache("user:42", &mut dest, DAY, || async {
            Ok(Record::new(ada()))
        })
        .await
    );
    assert_eq!(dest.into_inner(), ada());
}

#[tokio::test]
async fn repo_over_moka_service_type_is_usable_directly() {
    let repo: Repo<MokaCacheService> = Repo::new(Cache::new(MokaCacheService::new(10)));
    let mut dest = Records::<u8>::default();
    assert_ok!(
        repo.query_with_cache("bytes", &mut dest, DAY, || async {
            Ok(Records::new(vec![1, 2]))
        })
        .await
    );
    assert_eq!(dest.into_inner(), vec![1, 2]);
}

fn open_circuit_repo(moka: MokaCacheService) -> Repo<CacheProvider> {
    let breaker = Arc::new(CircuitBreaker::new(
        "cache".to_string(),
        CircuitBreakerConfig {
            failure_threshold: 1,
            timeout: Duration::from_secs(60),
            success_threshold: 1,
        },
    ));
    breaker.record_failure_manual(Duration::from_millis(1));
    Repo::new(Cache::new(CacheProvider::moka(moka).with_circuit_breaker(breaker)))
}

#[tokio::test]
async fn open_circuit_invalidation_is_not_reported_as_done() {
    let moka = MokaCacheService::new(100);
    let direct = Cache::new(moka.clone());
    assert_ok!(direct.set("n", &1u32, DAY).await);

    let repo = open_circuit_repo(moka);
    let error = assert_err!(repo.cache().del(&["n"]).await);
    assert!(matches!(error, CacheError::CircuitOpen(_)));

    // best effort: logged, never returned, and the entry is untouched
    repo.del_cache("n").await;
    assert_eq!(assert_ok!(direct.get::<u32>("n").await), CacheValue::Hit(1));
}

#[tokio::test]
async fn open_circuit_write_fails_strict_reads_and_spares_lenient_ones() {
    let strict = open_circuit_repo(MokaCacheService::new(100));
    let mut dest = Record::<User>::default();
    let error = assert_err!(
        strict
            .query_with_cache("user:1", &mut dest, DAY, || async { Ok(Record::new(ada())) })
            .await
    );
    assert!(matches!(
        error,
        RepoError::CacheWrite {
            source: CacheError::CircuitOpen(_),
            ..
        }
    ));

    let lenient = open_circuit_repo(MokaCacheService::new(100)).with_strict_cache_writes(false);
    let mut dest = Record::<User>::default();
    assert_ok!(
        lenient
            .query_with_cache("user:1", &mut dest, DAY, || async { Ok(Record::new(ada())) })
            .await
    );
    assert_eq!(dest.into_inner(), ada());
}
