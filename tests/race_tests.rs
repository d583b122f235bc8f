//! Integration tests for the race strategy

mod common;

use bytes::Bytes;
use common::{config, Upstream};
use fetch_cache::{
    wrap, CachedFetcher, Diagnostic, FetchError, Fetched, Fetcher, MemoryStore, Strategy,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const URL: &str = "https://a.com/x";
const KEY: &str = "race-https://a.com/x";

#[tokio::test]
async fn test_fast_store_answers_then_refreshes() {
    let upstream = Arc::new(
        Upstream::new(|_| Ok(Fetched::new("new"))).with_delay(Duration::from_millis(100)),
    );
    let store = Arc::new(MemoryStore::new());
    store.seed(KEY, Bytes::from_static(b"Sold"), Duration::from_secs(300)).await;

    let cached =
        CachedFetcher::new(upstream.clone(), store.clone(), config(Strategy::Race, "race"))
            .unwrap();

    assert_eq!(cached.fetch(URL).await.unwrap(), Fetched::new("old"));
    cached.drain().await;

    assert_eq!(upstream.calls(), 1);
    assert_eq!(store.peek(KEY).await, Some(Bytes::from_static(b"Snew")));
    assert_eq!(cached.stats().hits, 1);
    assert_eq!(cached.stats().writes, 1);
}

#[tokio::test]
async fn test_fast_upstream_answers_and_updates_store() {
    let upstream = Arc::new(Upstream::new(|_| Ok(Fetched::new("new"))));
    let store = Arc::new(
        MemoryStore::builder()
            .latency(Duration::from_millis(100))
            .build(),
    );
    store.seed(KEY, Bytes::from_static(b"Sold"), Duration::from_secs(300)).await;

    let cached =
        CachedFetcher::new(upstream.clone(), store.clone(), config(Strategy::Race, "race"))
            .unwrap();

    assert_eq!(cached.fetch(URL).await.unwrap(), Fetched::new("new"));
    cached.drain().await;

    assert_eq!(store.peek(KEY).await, Some(Bytes::from_static(b"Snew")));
    assert_eq!(cached.stats().misses, 1);
    assert_eq!(cached.stats().hits, 0);
}

#[tokio::test]
async fn test_corrupt_entry_loses_and_is_replaced() {
    let upstream = Arc::new(
        Upstream::new(|_| Ok(Fetched::new(json!({"ok": true}))))
            .with_delay(Duration::from_millis(20)),
    );
    let store = Arc::new(MemoryStore::new());
    store.seed(KEY, Bytes::from_static(b"Xgarbage"), Duration::from_secs(300)).await;

    let cached =
        CachedFetcher::new(upstream.clone(), store.clone(), config(Strategy::Race, "race"))
            .unwrap();
    let mut diagnostics = cached.subscribe();

    assert_eq!(
        cached.fetch(URL).await.unwrap(),
        Fetched::new(json!({"ok": true}))
    );
    cached.drain().await;

    assert_eq!(
        store.peek(KEY).await,
        Some(Bytes::from_static(br#"O{"ok":true}"#))
    );
    assert!(matches!(
        diagnostics.try_recv().unwrap(),
        Diagnostic::DecodeFailed { .. }
    ));
}

#[tokio::test]
async fn test_upstream_not_found_is_stored() {
    let upstream = Arc::new(Upstream::new(|_| Err(FetchError::not_found())));
    let store = Arc::new(MemoryStore::new());
    let cached =
        CachedFetcher::new(upstream.clone(), store.clone(), config(Strategy::Race, "race"))
            .unwrap();

    let err = cached.fetch(URL).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_cached());
    cached.drain().await;

    assert_eq!(store.peek(KEY).await, Some(Bytes::from_static(b"E404")));
}

#[tokio::test]
async fn test_opaque_failure_leaves_cached_value_alone() {
    let upstream = Arc::new(
        Upstream::new(|_| Err(FetchError::Other(anyhow::anyhow!("upstream timed out"))))
            .with_delay(Duration::from_millis(50)),
    );
    let store = Arc::new(MemoryStore::new());
    store.seed(KEY, Bytes::from_static(b"Sold"), Duration::from_secs(300)).await;

    let cached =
        CachedFetcher::new(upstream.clone(), store.clone(), config(Strategy::Race, "race"))
            .unwrap();

    assert_eq!(cached.fetch(URL).await.unwrap(), Fetched::new("old"));
    cached.drain().await;

    assert_eq!(store.counters().sets, 0);
    assert_eq!(store.peek(KEY).await, Some(Bytes::from_static(b"Sold")));
}

#[tokio::test]
async fn test_opaque_failure_on_empty_store_reaches_caller() {
    let upstream = Arc::new(Upstream::new(|_| {
        Err(FetchError::Other(anyhow::anyhow!("upstream timed out")))
    }));
    let store = Arc::new(MemoryStore::new());
    let cached =
        CachedFetcher::new(upstream.clone(), store.clone(), config(Strategy::Race, "race"))
            .unwrap();

    let err = cached.fetch(URL).await.unwrap_err();
    assert_eq!(err.to_string(), "upstream timed out");
    cached.drain().await;

    assert_eq!(store.counters().sets, 0);
}

#[tokio::test]
async fn test_wrap_from_json_configuration() {
    let store = Arc::new(MemoryStore::new());
    let cached = wrap(
        Upstream::new(|_| Ok(Fetched::new("hello"))),
        store.clone(),
        json!({
            "ttl": {"a.com": 60, "default": 600},
            "strategy": "race",
            "namespace": "race"
        }),
    )
    .unwrap();

    assert_eq!(cached.config().strategy, Strategy::Race);
    assert_eq!(cached.fetch(URL).await.unwrap(), Fetched::new("hello"));
    cached.drain().await;

    let ttl = store.ttl(KEY).await.unwrap();
    assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(50));
}

#[tokio::test]
async fn test_concurrent_callers_each_get_one_answer() {
    let upstream = Arc::new(
        Upstream::new(|url| Ok(Fetched::new(url.to_string())))
            .with_delay(Duration::from_millis(10)),
    );
    let store = Arc::new(MemoryStore::builder().high_water(4).build());
    let cached =
        CachedFetcher::new(upstream.clone(), store.clone(), config(Strategy::Race, "race"))
            .unwrap();

    let calls = (0..20).map(|i| {
        let cached = cached.clone();
        async move {
            let url = format!("https://a.com/{}", i % 5);
            (url.clone(), cached.fetch(&url).await)
        }
    });
    let results = futures::future::join_all(calls).await;

    for (url, result) in results {
        assert_eq!(result.unwrap(), Fetched::new(url));
    }
    cached.drain().await;

    let stats = cached.stats();
    assert_eq!(stats.hits + stats.misses + stats.bypasses, 20);
    assert_eq!(upstream.calls(), 20);
}
