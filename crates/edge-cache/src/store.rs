//! Response store boundary and its adapters.

use async_trait::async_trait;

use crate::entry::CachedEntry;
use crate::key::CacheKey;

/// Result type for store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Store operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to serialize/deserialize a stored entry.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Key-value store holding cached responses.
///
/// Writes replace the whole entry. Expiry and eviction belong to the store.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait CacheStore: Send + Sync {
    /// Look up an entry.
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<CachedEntry>>;

    /// Store an entry, replacing any previous one.
    async fn put(&self, key: &CacheKey, entry: CachedEntry) -> CacheResult<()>;
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<S: CacheStore + ?Sized> CacheStore for std::sync::Arc<S> {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<CachedEntry>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &CacheKey, entry: CachedEntry) -> CacheResult<()> {
        (**self).put(key, entry).await
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use memory::MemoryStore;

#[cfg(not(target_arch = "wasm32"))]
mod memory {
    use std::time::{Duration, Instant};

    use async_trait::async_trait;

    use super::{CacheResult, CacheStore};
    use crate::entry::CachedEntry;
    use crate::key::CacheKey;
    use crate::policy::{CacheControl, IMMUTABLE};

    type InMemoryCache = moka::future::Cache<String, CachedEntry>;

    /// Expires entries according to the edge `Cache-Control` they carry.
    struct EdgeExpiration;

    fn time_to_live(entry: &CachedEntry) -> Option<Duration> {
        let value = entry.edge_cache_control()?;
        if value.trim().eq_ignore_ascii_case(IMMUTABLE) {
            return None;
        }
        CacheControl::parse(value)
            .max_age
            .map(Duration::from_secs)
    }

    impl moka::Expiry<String, CachedEntry> for EdgeExpiration {
        fn expire_after_create(
            &self,
            _key: &String,
            value: &CachedEntry,
            _current_time: Instant,
        ) -> Option<Duration> {
            time_to_live(value)
        }

        fn expire_after_update(
            &self,
            _key: &String,
            value: &CachedEntry,
            _current_time: Instant,
            _current_duration: Option<Duration>,
        ) -> Option<Duration> {
            time_to_live(value)
        }
    }

    /// Bounded in-process store.
    ///
    /// Each entry lives for the `max-age` of its edge `Cache-Control`;
    /// `immutable` entries live until evicted for capacity.
    #[derive(Clone)]
    pub struct MemoryStore {
        cache: InMemoryCache,
    }

    impl MemoryStore {
        /// Create a store holding at most `max_entries` entries.
        pub fn new(max_entries: u64) -> Self {
            let cache = InMemoryCache::builder()
                .max_capacity(max_entries)
                .name("swr-responses")
                .expire_after(EdgeExpiration)
                .build();
            Self { cache }
        }

        /// Approximate number of stored entries.
        pub fn entry_count(&self) -> u64 {
            self.cache.entry_count()
        }
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self::new(10_000)
        }
    }

    impl std::fmt::Debug for MemoryStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MemoryStore")
                .field("entries", &self.cache.entry_count())
                .finish()
        }
    }

    #[async_trait]
    impl CacheStore for MemoryStore {
        async fn get(&self, key: &CacheKey) -> CacheResult<Option<CachedEntry>> {
            Ok(self.cache.get(key.as_str()).await)
        }

        async fn put(&self, key: &CacheKey, entry: CachedEntry) -> CacheResult<()> {
            self.cache.insert(key.as_str().to_string(), entry).await;
            Ok(())
        }
    }

}

/// Store backed by a Spin key-value store.
///
/// The store is opened per operation so the value stays cheap to clone and
/// never holds a host resource across requests.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct SpinKvStore {
    name: String,
}

#[cfg(target_arch = "wasm32")]
impl SpinKvStore {
    /// Use the store with the given label.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn open(&self) -> CacheResult<spin_sdk::key_value::Store> {
        spin_sdk::key_value::Store::open(&self.name)
            .map_err(|e| CacheError::Storage(e.to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait(?Send)]
impl CacheStore for SpinKvStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<CachedEntry>> {
        match self.open()?.get(key.as_str()) {
            Ok(Some(bytes)) => Ok(Some(CachedEntry::from_json(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(CacheError::Storage(e.to_string())),
        }
    }

    async fn put(&self, key: &CacheKey, entry: CachedEntry) -> CacheResult<()> {
        let bytes = entry.to_json()?;
        self.open()?
            .set(key.as_str(), &bytes)
            .map_err(|e| CacheError::Storage(e.to_string()))
    }
}
