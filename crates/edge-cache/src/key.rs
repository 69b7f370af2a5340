//! Cache key derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Query parameter that separates the URL from the body digest in a key.
pub const KEY_PARAM: &str = "cache-key";

/// Digest function used for key derivation.
///
/// Must be stable across processes and releases. Not security-sensitive.
pub trait KeyHasher: Send + Sync {
    /// Digest `bytes` into a printable string.
    fn digest(&self, bytes: &[u8]) -> String;
}

/// Hex-encoded SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl KeyHasher for Sha256Hasher {
    fn digest(&self, bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}

/// A cache key uniquely identifying a (URL, body) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a cache key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key for a request: `url + "?cache-key=" + digest(body)`.
    ///
    /// Headers never take part, so two requests differing only in headers
    /// share an entry.
    pub fn derive(url: &str, body: &[u8], hasher: &dyn KeyHasher) -> Self {
        Self(format!("{}?{}={}", url, KEY_PARAM, hasher.digest(body)))
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
