//! Stale-while-revalidate caching for the edge proxy.
//!
//! This crate provides:
//! - `CacheKey` - Deterministic keys from request URL and body digest
//! - `CacheControl` / `ResolvedPolicies` - Origin `Cache-Control` parsing into edge and client policies
//! - `HeaderRewrite` - Set/remove header edits on buffered responses
//! - `CachedEntry` - Stored responses carrying their metadata as headers
//! - `CacheStore` - The response store boundary, with `MemoryStore` (native) and `SpinKvStore` (wasm32)
//! - `OriginFetcher` - Uncached origin fetches and entry construction
//! - `SwrCache` - Lookup, freshness evaluation and background revalidation
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_cache::{MemoryStore, SwrCache};
//! use edge_executor::TokioWork;
//!
//! let cache = SwrCache::new(Arc::new(MemoryStore::new(10_000)), Arc::new(client), TokioWork::new())
//!     .with_config(&config);
//!
//! let served = cache.handle(&request).await;
//! println!("{} {}", served.status, served.key);
//! ```

mod entry;
mod headers;
mod key;
mod origin;
mod policy;
mod store;
mod swr;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod testing;

pub use entry::*;
pub use headers::*;
pub use key::*;
pub use origin::*;
pub use policy::*;
pub use store::*;
pub use swr::*;
