//! Rate limiter over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use services::ratelimit::address_root;
use services::{RateLimitError, RateLimitSettings, RateLimiter};
use storage_adapters::MemoryStore;

fn limiter(store: Arc<MemoryStore>) -> RateLimiter {
    RateLimiter::new(
        store,
        RateLimitSettings {
            cooldown: Duration::from_secs(5),
            max_retries: 3,
        },
    )
}

#[tokio::test]
async fn first_action_is_admitted_and_stamped() {
    let store = Arc::new(MemoryStore::new());
    let limiter = limiter(store.clone());

    limiter.check("10.0.0.1").await.unwrap();
    assert_eq!(store.ratelimit_count("10.0.0.0/24"), 1);
}

#[tokio::test]
async fn recent_stamp_limits_until_cooldown_passes() {
    let store = Arc::new(MemoryStore::new());
    let last = Utc::now() - chrono::Duration::seconds(1);
    store.stamp_ratelimit("10.0.0.1", "10.0.0.0/24", last);

    let err = limiter(store.clone()).check("10.0.0.2").await.unwrap_err();
    let RateLimitError::Limited { expires_at } = err else {
        panic!("expected Limited, got {err:?}");
    };
    let remaining = (expires_at - Utc::now()).num_milliseconds();
    assert!((3_000..=4_100).contains(&remaining), "remaining {remaining}ms");
    // rejected attempts leave no stamp
    assert_eq!(store.ratelimit_count("10.0.0.0/24"), 1);
}

#[tokio::test]
async fn stale_stamp_admits() {
    let store = Arc::new(MemoryStore::new());
    store.stamp_ratelimit("10.0.0.1", "10.0.0.0/24", Utc::now() - chrono::Duration::seconds(6));

    limiter(store.clone()).check("10.0.0.1").await.unwrap();
    assert_eq!(store.ratelimit_count("10.0.0.0/24"), 2);
}

#[tokio::test]
async fn concurrent_actions_from_one_root_admit_exactly_one() {
    let store = Arc::new(MemoryStore::new());
    let limiter = limiter(store.clone());

    let handles: Vec<_> = (1..=8)
        .map(|n| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check(&format!("10.0.0.{n}")).await })
        })
        .collect();

    let mut admitted = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => admitted += 1,
            Err(RateLimitError::Limited { .. }) => limited += 1,
            Err(other) => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!((admitted, limited), (1, 7));
    assert_eq!(store.ratelimit_count("10.0.0.0/24"), 1);
}

#[tokio::test]
async fn distinct_roots_do_not_interfere() {
    let store = Arc::new(MemoryStore::new());
    let limiter = limiter(store.clone());

    limiter.check("10.0.0.1").await.unwrap();
    limiter.check("10.0.1.1").await.unwrap();
    limiter.check("2001:db8::1").await.unwrap();
    assert!(limiter.check("10.0.0.200").await.is_err());

    assert_eq!(store.ratelimit_count(&address_root("2001:db8::1")), 1);
}
