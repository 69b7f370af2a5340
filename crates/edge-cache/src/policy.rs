//! `Cache-Control` parsing and translation into edge and client policies.

use serde::{Deserialize, Serialize};

/// Client policy used when the origin does not grant a client `max-age`.
///
/// Forces the client to come back to the edge, which owns freshness.
pub const DEFAULT_CLIENT_POLICY: &str = "public, max-age=0, must-revalidate";

/// Edge value for `stale-while-revalidate=0`.
pub const IMMUTABLE: &str = "immutable";

/// Numeric directives read from an origin `Cache-Control` header.
///
/// `None` means the directive was absent. A present directive with a
/// missing or malformed value reads as `Some(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheControl {
    /// `max-age`, in seconds.
    pub max_age: Option<u64>,
    /// `s-maxage`, in seconds.
    pub s_maxage: Option<u64>,
    /// `stale-while-revalidate`, in seconds.
    pub stale_while_revalidate: Option<u64>,
}

impl CacheControl {
    /// Parse a comma-separated directive list. Unknown directives are ignored.
    pub fn parse(header: &str) -> Self {
        let mut parsed = Self::default();

        for directive in header.split(',') {
            let (name, value) = match directive.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (directive, None),
            };

            let name = name.trim().to_ascii_lowercase().replace('_', "-");
            let seconds = value.map(parse_seconds).unwrap_or(0);

            match name.as_str() {
                "max-age" => parsed.max_age = Some(seconds),
                "s-maxage" => parsed.s_maxage = Some(seconds),
                "stale-while-revalidate" => parsed.stale_while_revalidate = Some(seconds),
                _ => {}
            }
        }

        parsed
    }

    /// Derive the edge policy. `None` means the response must not be stored.
    pub fn edge_policy(&self, now_millis: u64) -> Option<EdgePolicy> {
        let s_maxage = self.s_maxage?;

        let value = match self.stale_while_revalidate {
            None => format!("max-age={}", s_maxage),
            Some(0) => IMMUTABLE.to_string(),
            Some(swr) => format!("max-age={}", s_maxage.saturating_add(swr)),
        };

        Some(EdgePolicy {
            value,
            stale_at: now_millis.saturating_add(s_maxage.saturating_mul(1000)),
        })
    }

    /// Derive the `Cache-Control` forwarded to clients.
    pub fn client_policy(&self) -> String {
        match self.max_age {
            Some(max_age) if max_age > 0 => format!("max-age={}", max_age),
            _ => DEFAULT_CLIENT_POLICY.to_string(),
        }
    }

    /// When an entry stuck in `REVALIDATING` since `since` may be
    /// revalidated again.
    ///
    /// Only defined for a positive stale-while-revalidate window.
    pub fn revalidation_deadline(&self, since: u64) -> Option<u64> {
        match self.stale_while_revalidate {
            Some(swr) if swr > 0 => Some(since.saturating_add(swr.saturating_mul(1000))),
            _ => None,
        }
    }
}

/// How long the edge may keep a response and when it turns stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePolicy {
    /// `Cache-Control` value stored with the entry.
    pub value: String,
    /// Absolute time (epoch millis) after which the entry is stale.
    pub stale_at: u64,
}

/// Both policies derived from one origin response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPolicies {
    /// Parsed directives.
    pub directives: CacheControl,
    /// Edge policy, absent for non-cacheable responses.
    pub edge: Option<EdgePolicy>,
    /// Client-facing `Cache-Control`.
    pub client: String,
}

impl ResolvedPolicies {
    /// Parse `header` and derive both policies at `now_millis`.
    pub fn resolve(header: &str, now_millis: u64) -> Self {
        let directives = CacheControl::parse(header);
        Self {
            edge: directives.edge_policy(now_millis),
            client: directives.client_policy(),
            directives,
        }
    }
}

fn parse_seconds(raw: &str) -> u64 {
    let raw = raw.trim().trim_matches('"');
    if let Ok(n) = raw.parse::<u64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => n as u64,
        _ => 0,
    }
}
