//! Uncached origin fetches and entry construction.

use std::sync::Arc;

use edge_core::{Clock, ProxyConfig, ProxyRequest, ProxyResponse, SystemClock};
use edge_data::{FetchError, OriginClient, OriginRequest};
use http::{header, StatusCode};

use crate::entry::{CacheStatus, CachedEntry};
use crate::headers::{header_names, HeaderRewrite, UNCACHEABLE_HEADERS};
use crate::key::CacheKey;
use crate::policy::{ResolvedPolicies, DEFAULT_CLIENT_POLICY};
use crate::store::CacheStore;

/// Settings for outbound origin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginSettings {
    /// Query parameter carrying the cache-busting timestamp.
    pub bust_param: String,
    /// Advisory `Cache-Control` sent to the origin.
    pub origin_cache_control: Option<String>,
}

impl Default for OriginSettings {
    fn default() -> Self {
        Self {
            bust_param: "_swr".to_string(),
            origin_cache_control: Some("no-cache".to_string()),
        }
    }
}

impl OriginSettings {
    /// Take the origin settings from the proxy config.
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            bust_param: config.cache_bust_param.clone(),
            origin_cache_control: config.origin_cache_control.clone(),
        }
    }
}

/// Outcome of one origin fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Response for the caller, labelled MISS.
    pub response: ProxyResponse,
    /// Entry to store, present only for cacheable responses.
    pub entry: Option<CachedEntry>,
    /// Status the origin answered with.
    pub origin_status: StatusCode,
}

/// Issues uncached origin requests and writes cacheable results to the store.
pub struct OriginFetcher<S, C> {
    store: Arc<S>,
    client: Arc<C>,
    clock: Arc<dyn Clock>,
    settings: Arc<OriginSettings>,
}

impl<S, C> Clone for OriginFetcher<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            client: Arc::clone(&self.client),
            clock: Arc::clone(&self.clock),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<S: CacheStore, C: OriginClient> OriginFetcher<S, C> {
    /// Create a fetcher using the system clock and default settings.
    pub fn new(store: Arc<S>, client: Arc<C>) -> Self {
        Self {
            store,
            client,
            clock: Arc::new(SystemClock),
            settings: Arc::new(OriginSettings::default()),
        }
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use different outbound settings.
    pub fn with_settings(mut self, settings: OriginSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Current outbound settings.
    pub fn settings(&self) -> &OriginSettings {
        &self.settings
    }

    /// Fetch from the origin and build the response and, when cacheable, the
    /// entry to store. Nothing is written here.
    ///
    /// Only transport failures are errors; a non-2xx origin answer is passed
    /// through as a MISS.
    pub async fn fetch(&self, request: &ProxyRequest) -> Result<Fetched, FetchError> {
        let now = self.clock.now_millis();
        let outbound = OriginRequest::uncached(
            request,
            &self.settings.bust_param,
            now,
            self.settings.origin_cache_control.as_deref(),
        );

        tracing::debug!(
            request_id = %request.request_id,
            url = %outbound.url,
            "fetching from origin"
        );
        let response = self.client.send(outbound).await?;
        let origin_status = response.status;

        let origin_cache_control = response
            .header(header::CACHE_CONTROL.as_str())
            .map(str::to_string);

        let origin_cache_control = match origin_cache_control {
            Some(value) if response.is_success() => value,
            _ => {
                tracing::debug!(
                    request_id = %request.request_id,
                    status = origin_status.as_u16(),
                    "origin response not cacheable"
                );
                let response = HeaderRewrite::new()
                    .set(header_names::CACHE_STATUS, CacheStatus::Miss.as_str())
                    .set(header::CACHE_CONTROL.as_str(), DEFAULT_CLIENT_POLICY)
                    .apply(&response);
                return Ok(Fetched {
                    response,
                    entry: None,
                    origin_status,
                });
            }
        };

        let policies = ResolvedPolicies::resolve(&origin_cache_control, now);
        let stale_at = policies.edge.as_ref().map(|edge| edge.stale_at.to_string());

        let entry = policies.edge.as_ref().map(|edge| {
            let stored = HeaderRewrite::new()
                .remove_all(UNCACHEABLE_HEADERS)
                .set(header_names::CACHE_STATUS, CacheStatus::Hit.as_str())
                .set(header_names::STALE_AT, edge.stale_at.to_string())
                .set(header_names::ORIGIN_CACHE_CONTROL, &origin_cache_control)
                .set(header_names::CLIENT_CACHE_CONTROL, &policies.client)
                .set(header::CACHE_CONTROL.as_str(), &edge.value)
                .apply(&response);
            CachedEntry::from_response(&stored)
        });

        let response = HeaderRewrite::new()
            .set(header_names::CACHE_STATUS, CacheStatus::Miss.as_str())
            .set(header::CACHE_CONTROL.as_str(), &policies.client)
            .set_opt(header_names::STALE_AT, stale_at)
            .set(header_names::ORIGIN_CACHE_CONTROL, &origin_cache_control)
            .apply(&response);

        Ok(Fetched {
            response,
            entry,
            origin_status,
        })
    }

    /// Write an entry. Failures are logged, never returned.
    pub async fn store(&self, key: &CacheKey, entry: CachedEntry) {
        let stale_at = entry.stale_at();
        match self.store.put(key, entry).await {
            Ok(()) => tracing::debug!(key = %key, stale_at, "entry stored"),
            Err(e) => tracing::warn!(key = %key, error = %e, "failed to store entry"),
        }
    }

    /// Background revalidation: fetch and replace the entry when cacheable.
    ///
    /// On failure the entry keeps its REVALIDATING mark.
    pub async fn refresh(&self, key: CacheKey, request: ProxyRequest) {
        match self.fetch(&request).await {
            Ok(Fetched {
                entry: Some(entry), ..
            }) => {
                self.store(&key, entry).await;
                tracing::info!(
                    key = %key,
                    request_id = %request.request_id,
                    "entry revalidated"
                );
            }
            Ok(fetched) => tracing::warn!(
                key = %key,
                request_id = %request.request_id,
                status = fetched.origin_status.as_u16(),
                "revalidation response not cacheable, entry left revalidating"
            ),
            Err(e) => tracing::warn!(
                key = %key,
                request_id = %request.request_id,
                error = %e,
                "revalidation fetch failed, entry left revalidating"
            ),
        }
    }
}
