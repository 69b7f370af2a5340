//! Cache header names and the header rewriter.

use edge_core::ProxyResponse;
use http::{HeaderMap, HeaderName, HeaderValue};

/// Header names used by the proxy.
pub mod header_names {
    /// Cache status label (MISS, HIT, REVALIDATING).
    pub const CACHE_STATUS: &str = "x-swr-cache";
    /// Absolute stale-at timestamp in epoch millis.
    pub const STALE_AT: &str = "x-swr-stale-at";
    /// The origin's original `Cache-Control`.
    pub const ORIGIN_CACHE_CONTROL: &str = "x-swr-origin-cache-control";
    /// Client-facing `Cache-Control`, kept on stored entries only.
    pub const CLIENT_CACHE_CONTROL: &str = "x-swr-client-cache-control";
    /// When the current revalidation was scheduled, in epoch millis. Stored entries only.
    pub const REVALIDATION_STARTED: &str = "x-swr-revalidation-started";
    /// Cache key used for lookup (debug only).
    pub const CACHE_KEY: &str = "x-swr-cache-key";
    /// Request header enabling debug headers.
    pub const DEBUG_CACHE: &str = "x-debug-cache";
}

/// Headers never written to the store.
pub const UNCACHEABLE_HEADERS: &[&str] = &[
    "set-cookie",
    "vary",
    header_names::CACHE_STATUS,
    header_names::REVALIDATION_STARTED,
];

#[derive(Debug, Clone)]
enum HeaderOp {
    Set(HeaderValue),
    Remove,
}

/// A set of header edits applied to a copy of a response.
///
/// Headers not mentioned are left untouched. `set` replaces every existing
/// value with a single one, `remove` deletes every value.
#[derive(Debug, Clone, Default)]
pub struct HeaderRewrite {
    ops: Vec<(HeaderName, HeaderOp)>,
}

impl HeaderRewrite {
    /// Create an empty rewrite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a header.
    ///
    /// An invalid value still deletes the existing values, so the old value
    /// never survives a failed set. Invalid names are skipped with a warning.
    pub fn set(mut self, name: &str, value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        let header = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(header) => header,
            Err(_) => {
                tracing::warn!(header = name, "skipping invalid header name");
                return self;
            }
        };
        match HeaderValue::from_str(value) {
            Ok(value) => self.ops.push((header, HeaderOp::Set(value))),
            Err(_) => {
                tracing::warn!(header = name, value, "invalid header value, removing header");
                self.ops.push((header, HeaderOp::Remove));
            }
        }
        self
    }

    /// Replace a header when `value` is present, leave it untouched otherwise.
    pub fn set_opt<V: AsRef<str>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(name, value),
            None => self,
        }
    }

    /// Delete a header.
    pub fn remove(mut self, name: &str) -> Self {
        match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => self.ops.push((name, HeaderOp::Remove)),
            Err(_) => tracing::warn!(header = name, "skipping invalid header name"),
        }
        self
    }

    /// Delete every header in `names`.
    pub fn remove_all(self, names: &[&str]) -> Self {
        names.iter().fold(self, |rewrite, name| rewrite.remove(name))
    }

    /// Apply the edits in place.
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        for (name, op) in &self.ops {
            match op {
                HeaderOp::Set(value) => {
                    headers.insert(name.clone(), value.clone());
                }
                HeaderOp::Remove => {
                    headers.remove(name);
                }
            }
        }
    }

    /// Return a new response with the edits applied and the same body.
    pub fn apply(&self, base: &ProxyResponse) -> ProxyResponse {
        let mut response = base.clone();
        self.apply_to(&mut response.headers);
        response
    }
}

/// Whether the request asked for debug headers.
pub fn should_include_debug_headers(request_headers: &HeaderMap) -> bool {
    request_headers
        .get(header_names::DEBUG_CACHE)
        .is_some_and(|value| value == "1")
}
