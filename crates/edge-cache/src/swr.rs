//! Stale-while-revalidate request handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use edge_core::{Clock, ProxyConfig, ProxyRequest, ProxyResponse, SystemClock};
use edge_data::OriginClient;
use edge_executor::BackgroundWork;
use http::{header, StatusCode};

use crate::entry::{CacheStatus, CachedEntry};
use crate::headers::{header_names, should_include_debug_headers, HeaderRewrite};
use crate::key::{CacheKey, KeyHasher, Sha256Hasher};
use crate::origin::{Fetched, OriginFetcher, OriginSettings};
use crate::policy::DEFAULT_CLIENT_POLICY;
use crate::store::CacheStore;

/// Freshness of a stored entry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within its freshness window.
    Fresh,
    /// Revalidation is due.
    Stale,
    /// A revalidation is already in flight.
    Revalidating,
}

impl Freshness {
    /// Evaluate `entry` at `now_millis`.
    ///
    /// An entry without a readable stale-at is always stale. With
    /// `retry_stuck` set, an entry marked revalidating becomes stale again
    /// once a full stale-while-revalidate window has passed since the
    /// revalidation was scheduled (or since stale-at for unstamped entries).
    pub fn evaluate(entry: &CachedEntry, now_millis: u64, retry_stuck: bool) -> Self {
        let stale_at = entry.stale_at();

        if entry.cache_status() == Some(CacheStatus::Revalidating) {
            let deadline = entry
                .revalidation_started()
                .or(stale_at)
                .filter(|_| retry_stuck)
                .and_then(|since| entry.origin_directives().revalidation_deadline(since));
            return match deadline {
                Some(deadline) if now_millis > deadline => Self::Stale,
                _ => Self::Revalidating,
            };
        }

        match stale_at {
            Some(stale_at) if now_millis <= stale_at => Self::Fresh,
            _ => Self::Stale,
        }
    }
}

/// Result of handling one request.
#[derive(Debug, Clone)]
pub struct Served {
    /// Response for the client.
    pub response: ProxyResponse,
    /// Key the request mapped to.
    pub key: CacheKey,
    /// Cache status label on the response.
    pub status: CacheStatus,
    /// Origin status on the MISS path.
    pub origin_status: Option<StatusCode>,
    /// Duration of the foreground origin fetch.
    pub origin_fetch: Option<Duration>,
    /// Whether this request scheduled a revalidation.
    pub revalidation_triggered: bool,
}

/// The SWR cache in front of one origin client.
///
/// Serves stored entries immediately and refreshes stale ones through the
/// background-work collaborator. The check-then-mark on stale entries is not
/// atomic; concurrent observers may each schedule a refresh.
pub struct SwrCache<S, C, W> {
    store: Arc<S>,
    fetcher: OriginFetcher<S, C>,
    work: W,
    clock: Arc<dyn Clock>,
    hasher: Arc<dyn KeyHasher>,
    retry_stuck_revalidation: bool,
}

impl<S, C, W> SwrCache<S, C, W>
where
    S: CacheStore + 'static,
    C: OriginClient + 'static,
    W: BackgroundWork,
{
    /// Create a cache with the system clock, SHA-256 keys and default settings.
    pub fn new(store: Arc<S>, client: Arc<C>, work: W) -> Self {
        Self {
            fetcher: OriginFetcher::new(Arc::clone(&store), client),
            store,
            work,
            clock: Arc::new(SystemClock),
            hasher: Arc::new(Sha256Hasher),
            retry_stuck_revalidation: false,
        }
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.fetcher = self.fetcher.with_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// Use a different key digest.
    pub fn with_hasher(mut self, hasher: Arc<dyn KeyHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Use different outbound settings.
    pub fn with_origin_settings(mut self, settings: OriginSettings) -> Self {
        self.fetcher = self.fetcher.with_settings(settings);
        self
    }

    /// Re-trigger revalidation of entries stuck in REVALIDATING.
    pub fn with_retry_stuck_revalidation(mut self, retry: bool) -> Self {
        self.retry_stuck_revalidation = retry;
        self
    }

    /// Apply the proxy configuration.
    pub fn with_config(self, config: &ProxyConfig) -> Self {
        self.with_origin_settings(OriginSettings::from_config(config))
            .with_retry_stuck_revalidation(config.retry_stuck_revalidation)
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The background-work collaborator.
    pub fn work(&self) -> &W {
        &self.work
    }

    /// Key for a request.
    pub fn key_for(&self, request: &ProxyRequest) -> CacheKey {
        CacheKey::derive(request.url.as_str(), &request.body, self.hasher.as_ref())
    }

    /// Handle a request: serve from the store when possible, otherwise fetch.
    ///
    /// Never fails; origin transport failures become `502 Bad Gateway`.
    pub async fn handle(&self, request: &ProxyRequest) -> Served {
        let key = self.key_for(request);

        let mut served = match self.lookup(&key).await {
            Some(entry) => self.serve_cached(key, entry, request).await,
            None => self.serve_from_origin(key, request).await,
        };

        if should_include_debug_headers(&request.headers) {
            HeaderRewrite::new()
                .set(header_names::CACHE_KEY, served.key.as_str())
                .apply_to(&mut served.response.headers);
        }

        tracing::debug!(
            request_id = %request.request_id,
            key = %served.key,
            status = %served.status,
            "request served"
        );
        served
    }

    /// Look up a key. Store failures read as a miss.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CachedEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "store lookup failed, treating as miss");
                None
            }
        }
    }

    /// Mark the entry REVALIDATING and schedule a background refresh.
    ///
    /// The mark is written before this returns; the refresh is never awaited.
    pub async fn revalidate(&self, key: &CacheKey, entry: &CachedEntry, request: &ProxyRequest) {
        let marked = entry.mark_revalidating(self.clock.now_millis());
        if let Err(e) = self.store.put(key, marked).await {
            tracing::warn!(key = %key, error = %e, "failed to mark entry revalidating");
        }

        let fetcher = self.fetcher.clone();
        let task_key = key.clone();
        let task_request = request.clone();
        self.work.register(Box::pin(async move {
            fetcher.refresh(task_key, task_request).await;
        }));

        tracing::info!(
            key = %key,
            request_id = %request.request_id,
            stale_at = entry.stale_at(),
            "revalidation scheduled"
        );
    }

    async fn serve_cached(&self, key: CacheKey, entry: CachedEntry, request: &ProxyRequest) -> Served {
        let now = self.clock.now_millis();
        let freshness = Freshness::evaluate(&entry, now, self.retry_stuck_revalidation);

        let revalidation_triggered = freshness == Freshness::Stale;
        if revalidation_triggered {
            self.revalidate(&key, &entry, request).await;
        }

        let status = if revalidation_triggered {
            CacheStatus::Revalidating
        } else {
            CacheStatus::Hit
        };
        let client_cache_control = entry
            .client_cache_control()
            .unwrap_or(DEFAULT_CLIENT_POLICY);

        let response = HeaderRewrite::new()
            .set(header_names::CACHE_STATUS, status.as_str())
            .set(header::CACHE_CONTROL.as_str(), client_cache_control)
            .remove(header_names::CLIENT_CACHE_CONTROL)
            .remove(header_names::REVALIDATION_STARTED)
            .apply(&entry.to_response());

        Served {
            response,
            key,
            status,
            origin_status: None,
            origin_fetch: None,
            revalidation_triggered,
        }
    }

    async fn serve_from_origin(&self, key: CacheKey, request: &ProxyRequest) -> Served {
        let started = Instant::now();
        let fetched = self.fetcher.fetch(request).await;
        let elapsed = started.elapsed();

        match fetched {
            Ok(Fetched {
                response,
                entry,
                origin_status,
            }) => {
                if let Some(entry) = entry {
                    let fetcher = self.fetcher.clone();
                    let task_key = key.clone();
                    self.work.register(Box::pin(async move {
                        fetcher.store(&task_key, entry).await;
                    }));
                }
                Served {
                    response,
                    key,
                    status: CacheStatus::Miss,
                    origin_status: Some(origin_status),
                    origin_fetch: Some(elapsed),
                    revalidation_triggered: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    request_id = %request.request_id,
                    error = %e,
                    "origin fetch failed"
                );
                let response = HeaderRewrite::new()
                    .set(header_names::CACHE_STATUS, CacheStatus::Miss.as_str())
                    .apply(&ProxyResponse::text(
                        StatusCode::BAD_GATEWAY,
                        "origin request failed",
                    ));
                Served {
                    response,
                    key,
                    status: CacheStatus::Miss,
                    origin_status: None,
                    origin_fetch: Some(elapsed),
                    revalidation_triggered: false,
                }
            }
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use async_trait::async_trait;
    use edge_core::ManualClock;
    use edge_executor::TokioWork;
    use http::{HeaderMap, HeaderValue, Method};
    use url::Url;

    use super::*;
    use crate::store::{CacheError, CacheResult, MemoryStore};
    use crate::testing::ScriptedOrigin;

    const NOW: u64 = 1_700_000_000_000;

    struct Harness {
        cache: SwrCache<MemoryStore, ScriptedOrigin, Arc<TokioWork>>,
        origin: Arc<ScriptedOrigin>,
        clock: Arc<ManualClock>,
        work: Arc<TokioWork>,
    }

    fn harness(origin: ScriptedOrigin) -> Harness {
        let origin = Arc::new(origin);
        let clock = Arc::new(ManualClock::new(NOW));
        let work = Arc::new(TokioWork::new());
        let cache = SwrCache::new(Arc::new(MemoryStore::new(100)), origin.clone(), work.clone())
            .with_clock(clock.clone());
        Harness {
            cache,
            origin,
            clock,
            work,
        }
    }

    fn request() -> ProxyRequest {
        ProxyRequest::new(
            Method::POST,
            Url::parse("https://api.example.com/graphql").unwrap(),
            br#"{"query":"{ products { id } }"}"#.to_vec(),
        )
    }

    fn entry_with(headers: &[(&str, &str)]) -> CachedEntry {
        CachedEntry {
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Vec::new(),
        }
    }

    // === Freshness Tests ===

    #[test]
    fn test_freshness_fresh_until_stale_at() {
        let entry = entry_with(&[(header_names::STALE_AT, "1000")]);
        assert_eq!(Freshness::evaluate(&entry, 999, false), Freshness::Fresh);
        assert_eq!(Freshness::evaluate(&entry, 1000, false), Freshness::Fresh);
        assert_eq!(Freshness::evaluate(&entry, 1001, false), Freshness::Stale);
    }

    #[test]
    fn test_freshness_missing_stale_at_is_stale() {
        let entry = entry_with(&[(header_names::CACHE_STATUS, "HIT")]);
        assert_eq!(Freshness::evaluate(&entry, 0, false), Freshness::Stale);
    }

    #[test]
    fn test_freshness_revalidating_is_never_due_by_default() {
        let entry = entry_with(&[
            (header_names::CACHE_STATUS, "REVALIDATING"),
            (header_names::STALE_AT, "1000"),
            (header_names::ORIGIN_CACHE_CONTROL, "s-maxage=1, stale-while-revalidate=5"),
        ]);
        assert_eq!(Freshness::evaluate(&entry, 1_000_000, false), Freshness::Revalidating);
    }

    #[test]
    fn test_freshness_stuck_revalidation_retries_after_window() {
        let entry = entry_with(&[
            (header_names::CACHE_STATUS, "REVALIDATING"),
            (header_names::STALE_AT, "1000"),
            (header_names::ORIGIN_CACHE_CONTROL, "s-maxage=1, stale-while-revalidate=5"),
        ]);
        assert_eq!(Freshness::evaluate(&entry, 6000, true), Freshness::Revalidating);
        assert_eq!(Freshness::evaluate(&entry, 6001, true), Freshness::Stale);
    }

    #[test]
    fn test_freshness_stuck_without_swr_never_retries() {
        let entry = entry_with(&[
            (header_names::CACHE_STATUS, "REVALIDATING"),
            (header_names::STALE_AT, "1000"),
            (header_names::ORIGIN_CACHE_CONTROL, "s-maxage=1, stale-while-revalidate=0"),
        ]);
        assert_eq!(Freshness::evaluate(&entry, u64::MAX, true), Freshness::Revalidating);
    }

    #[test]
    fn test_freshness_stuck_window_measured_from_revalidation_start() {
        let entry = entry_with(&[
            (header_names::CACHE_STATUS, "REVALIDATING"),
            (header_names::STALE_AT, "1000"),
            (header_names::REVALIDATION_STARTED, "9000"),
            (header_names::ORIGIN_CACHE_CONTROL, "s-maxage=1, stale-while-revalidate=5"),
        ]);
        assert_eq!(Freshness::evaluate(&entry, 14_000, true), Freshness::Revalidating);
        assert_eq!(Freshness::evaluate(&entry, 14_001, true), Freshness::Stale);
    }

    // === Miss Path Tests ===

    #[tokio::test]
    async fn test_miss_then_hit() {
        let h = harness(ScriptedOrigin::cacheable(
            "s-maxage=60, stale-while-revalidate=30",
            b"B0",
        ));

        let first = h.cache.handle(&request()).await;
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(first.origin_status, Some(StatusCode::OK));
        assert_eq!(first.response.header(header_names::CACHE_STATUS), Some("MISS"));
        assert_eq!(h.work.join_all().await, 1);

        let second = h.cache.handle(&request()).await;
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.response.body, b"B0");
        assert_eq!(second.response.header("cache-control"), Some(DEFAULT_CLIENT_POLICY));
        assert_eq!(second.response.header(header_names::STALE_AT), Some("1700000060000"));
        assert!(second.response.header(header_names::CLIENT_CACHE_CONTROL).is_none());
        assert_eq!(h.origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_never_cache_without_cache_control() {
        let h = harness(ScriptedOrigin::respond(StatusCode::OK, HeaderMap::new(), b"B0"));

        for _ in 0..3 {
            let served = h.cache.handle(&request()).await;
            assert_eq!(served.status, CacheStatus::Miss);
            h.work.join_all().await;
        }
        assert_eq!(h.origin.calls(), 3);
        assert!(h.cache.lookup(&h.cache.key_for(&request())).await.is_none());
    }

    #[tokio::test]
    async fn test_origin_failure_maps_to_bad_gateway() {
        let h = harness(ScriptedOrigin::failing());

        let served = h.cache.handle(&request()).await;
        assert_eq!(served.response.status, StatusCode::BAD_GATEWAY);
        assert_eq!(served.response.header(header_names::CACHE_STATUS), Some("MISS"));
        assert!(served.origin_status.is_none());
        assert_eq!(h.work.join_all().await, 0);
    }

    // === Revalidation Tests ===

    #[tokio::test]
    async fn test_stale_entry_schedules_exactly_one_refresh() {
        let h = harness(
            ScriptedOrigin::cacheable("s-maxage=10, stale-while-revalidate=60", b"B0")
                .then_cacheable("s-maxage=10, stale-while-revalidate=60", b"B1"),
        );

        h.cache.handle(&request()).await;
        h.work.join_all().await;
        h.clock.advance_secs(11);

        let first = h.cache.handle(&request()).await;
        let second = h.cache.handle(&request()).await;

        assert_eq!(first.status, CacheStatus::Revalidating);
        assert!(first.revalidation_triggered);
        assert_eq!(first.response.body, b"B0");
        assert_eq!(second.status, CacheStatus::Hit);
        assert!(!second.revalidation_triggered);

        assert_eq!(h.work.join_all().await, 1);
        assert_eq!(h.origin.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_entry_revalidating() {
        let h = harness(
            ScriptedOrigin::cacheable("s-maxage=10, stale-while-revalidate=20", b"B0").then_fail(),
        );

        h.cache.handle(&request()).await;
        h.work.join_all().await;
        h.clock.advance_secs(11);
        h.cache.handle(&request()).await;
        h.work.join_all().await;

        let key = h.cache.key_for(&request());
        let stored = h.cache.lookup(&key).await.unwrap();
        assert_eq!(stored.cache_status(), Some(CacheStatus::Revalidating));

        h.clock.advance_secs(30);
        let served = h.cache.handle(&request()).await;
        assert_eq!(served.status, CacheStatus::Hit);
        assert_eq!(h.origin.calls(), 2);
    }

    #[tokio::test]
    async fn test_stuck_revalidation_retried_when_enabled() {
        let h = harness(
            ScriptedOrigin::cacheable("s-maxage=10, stale-while-revalidate=20", b"B0")
                .then_fail()
                .then_cacheable("s-maxage=10, stale-while-revalidate=20", b"B2"),
        );
        let cache = h.cache.with_retry_stuck_revalidation(true);

        cache.handle(&request()).await;
        h.work.join_all().await;
        h.clock.advance_secs(11);
        cache.handle(&request()).await;
        h.work.join_all().await;

        h.clock.advance_secs(5);
        assert_eq!(cache.handle(&request()).await.status, CacheStatus::Hit);

        h.clock.advance_secs(16);
        let retried = cache.handle(&request()).await;
        assert_eq!(retried.status, CacheStatus::Revalidating);
        h.work.join_all().await;

        assert_eq!(h.origin.calls(), 3);
        let stored = cache.lookup(&cache.key_for(&request())).await.unwrap();
        assert_eq!(stored.body, b"B2");
        assert_eq!(stored.cache_status(), Some(CacheStatus::Hit));
    }

    #[tokio::test]
    async fn test_stuck_retry_triggers_once_per_window() {
        let h = harness(
            ScriptedOrigin::cacheable("s-maxage=10, stale-while-revalidate=20", b"B0").then_fail(),
        );
        let cache = h.cache.with_retry_stuck_revalidation(true);

        cache.handle(&request()).await;
        h.work.join_all().await;
        h.clock.advance_secs(11);
        assert!(cache.handle(&request()).await.revalidation_triggered);
        h.work.join_all().await;

        h.clock.advance_secs(25);
        let triggered = {
            let mut count = 0;
            for _ in 0..5 {
                if cache.handle(&request()).await.revalidation_triggered {
                    count += 1;
                }
            }
            count
        };
        assert_eq!(triggered, 1);
        assert_eq!(h.work.join_all().await, 1);
        assert_eq!(h.origin.calls(), 3);

        let stored = cache.lookup(&cache.key_for(&request())).await.unwrap();
        assert_eq!(stored.revalidation_started(), Some(NOW + 36_000));
        assert_eq!(stored.cache_status(), Some(CacheStatus::Revalidating));
    }

    // === Header Tests ===

    #[tokio::test]
    async fn test_debug_header_exposes_key() {
        let h = harness(ScriptedOrigin::cacheable("s-maxage=60", b"B0"));
        let mut headers = HeaderMap::new();
        headers.insert(header_names::DEBUG_CACHE, HeaderValue::from_static("1"));
        let req = request().with_headers(headers);

        let served = h.cache.handle(&req).await;
        assert_eq!(
            served.response.header(header_names::CACHE_KEY),
            Some(served.key.as_str())
        );

        let plain = h.cache.handle(&request()).await;
        assert!(plain.response.header(header_names::CACHE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_request_headers_do_not_affect_key() {
        let h = harness(ScriptedOrigin::cacheable("s-maxage=60", b"B0"));
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer x"));

        assert_eq!(
            h.cache.key_for(&request()),
            h.cache.key_for(&request().with_headers(headers))
        );
    }

    // === Store Failure Tests ===

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &CacheKey) -> CacheResult<Option<CachedEntry>> {
            Err(CacheError::Storage("unavailable".to_string()))
        }

        async fn put(&self, _key: &CacheKey, _entry: CachedEntry) -> CacheResult<()> {
            Err(CacheError::Storage("unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_falls_back_to_origin() {
        let origin = Arc::new(ScriptedOrigin::cacheable("s-maxage=60", b"B0"));
        let work = Arc::new(TokioWork::new());
        let cache = SwrCache::new(Arc::new(BrokenStore), origin.clone(), work.clone());

        let served = cache.handle(&request()).await;
        assert_eq!(served.status, CacheStatus::Miss);
        assert_eq!(served.response.body, b"B0");
        assert_eq!(work.join_all().await, 1);
    }
}
