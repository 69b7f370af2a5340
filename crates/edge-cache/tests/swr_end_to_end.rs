//! End-to-end SWR lifecycle tests.
//!
//! Drives `SwrCache` with an in-memory store, a scripted origin, a manual
//! clock and tokio background work, observing MISS, HIT and REVALIDATING.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edge_cache::{header_names, CacheStatus, MemoryStore, SwrCache};
use edge_core::{ManualClock, ProxyRequest, ProxyResponse};
use edge_data::{FetchError, OriginClient, OriginRequest};
use edge_executor::TokioWork;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use url::Url;

const START: u64 = 1_700_000_000_000;

/// Serves bodies in order; the last one repeats.
struct VersionedOrigin {
    bodies: Vec<&'static str>,
    cache_control: Option<&'static str>,
    calls: AtomicUsize,
    bust_values: Mutex<Vec<String>>,
}

impl VersionedOrigin {
    fn new(cache_control: Option<&'static str>, bodies: Vec<&'static str>) -> Self {
        Self {
            bodies,
            cache_control,
            calls: AtomicUsize::new(0),
            bust_values: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginClient for VersionedOrigin {
    async fn send(&self, request: OriginRequest) -> Result<ProxyResponse, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let bust = request
            .url
            .query_pairs()
            .find(|(name, _)| name == "_swr")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        self.bust_values.lock().unwrap().push(bust);

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(cc) = self.cache_control {
            headers.insert("cache-control", HeaderValue::from_static(cc));
        }
        let body = self.bodies[call.min(self.bodies.len() - 1)];
        Ok(ProxyResponse::new(StatusCode::OK, headers, body.as_bytes().to_vec()))
    }
}

fn graphql_request(body: &str) -> ProxyRequest {
    ProxyRequest::new(
        Method::POST,
        Url::parse("https://api.example.com/graphql").unwrap(),
        body.as_bytes().to_vec(),
    )
}

#[tokio::test]
async fn test_miss_hit_revalidate_lifecycle() {
    let origin = Arc::new(VersionedOrigin::new(
        Some("s-maxage=10, stale-while-revalidate=60"),
        vec!["B0", "B1"],
    ));
    let clock = Arc::new(ManualClock::new(START));
    let work = Arc::new(TokioWork::new());
    let cache = SwrCache::new(Arc::new(MemoryStore::new(100)), origin.clone(), work.clone())
        .with_clock(clock.clone());
    let request = graphql_request(r#"{"query":"{ cart { id } }"}"#);

    // First request goes to the origin.
    let miss = cache.handle(&request).await;
    assert_eq!(miss.status, CacheStatus::Miss);
    assert_eq!(miss.response.body, b"B0");
    assert_eq!(miss.response.header("cache-control"), Some("public, max-age=0, must-revalidate"));
    work.join_all().await;

    // Fresh entry is served without touching the origin.
    clock.advance_secs(5);
    let hit = cache.handle(&request).await;
    assert_eq!(hit.status, CacheStatus::Hit);
    assert_eq!(hit.response.body, b"B0");
    assert_eq!(hit.response.header(header_names::CACHE_STATUS), Some("HIT"));
    assert_eq!(origin.calls(), 1);

    // Stale entry is still served, and a refresh is scheduled.
    clock.advance_secs(6);
    let stale = cache.handle(&request).await;
    assert_eq!(stale.status, CacheStatus::Revalidating);
    assert_eq!(stale.response.body, b"B0");
    assert_eq!(
        stale.response.header(header_names::CACHE_STATUS),
        Some("REVALIDATING")
    );

    assert_eq!(work.join_all().await, 1);
    assert_eq!(origin.calls(), 2);

    let stored = cache
        .lookup(&cache.key_for(&request))
        .await
        .expect("entry refreshed");
    assert_eq!(stored.cache_status(), Some(CacheStatus::Hit));
    assert_eq!(stored.stale_at(), Some(START + 11_000 + 10_000));
    assert_eq!(stored.body, b"B1");

    // The refreshed entry is fresh again.
    let refreshed = cache.handle(&request).await;
    assert_eq!(refreshed.status, CacheStatus::Hit);
    assert_eq!(refreshed.response.body, b"B1");
    assert_eq!(origin.calls(), 2);

    let busts = origin.bust_values.lock().unwrap().clone();
    assert_eq!(busts, vec![START.to_string(), (START + 11_000).to_string()]);
}

#[tokio::test]
async fn test_uncacheable_origin_is_always_a_miss() {
    let origin = Arc::new(VersionedOrigin::new(None, vec!["B0"]));
    let work = Arc::new(TokioWork::new());
    let cache = SwrCache::new(Arc::new(MemoryStore::new(100)), origin.clone(), work.clone());
    let request = graphql_request("{}");

    for _ in 0..2 {
        let served = cache.handle(&request).await;
        assert_eq!(served.status, CacheStatus::Miss);
        work.join_all().await;
    }
    assert_eq!(origin.calls(), 2);
    assert!(cache.lookup(&cache.key_for(&request)).await.is_none());
}

#[tokio::test]
async fn test_different_bodies_are_cached_separately() {
    let origin = Arc::new(VersionedOrigin::new(Some("s-maxage=60"), vec!["first", "second"]));
    let work = Arc::new(TokioWork::new());
    let cache = SwrCache::new(Arc::new(MemoryStore::new(100)), origin.clone(), work.clone())
        .with_clock(Arc::new(ManualClock::new(START)));

    let a = graphql_request(r#"{"id":1}"#);
    let b = graphql_request(r#"{"id":2}"#);

    cache.handle(&a).await;
    work.join_all().await;
    let served_b = cache.handle(&b).await;
    work.join_all().await;

    assert_eq!(served_b.status, CacheStatus::Miss);
    assert_eq!(served_b.response.body, b"second");
    assert_eq!(cache.handle(&a).await.response.body, b"first");
    assert_eq!(cache.handle(&b).await.response.body, b"second");
    assert_eq!(origin.calls(), 2);
}
