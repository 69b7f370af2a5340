//! Stored responses and their metadata.

use std::str::FromStr;

use edge_core::ProxyResponse;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

use crate::headers::header_names;
use crate::policy::CacheControl;

/// Cache status label attached to outgoing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Served from the origin.
    Miss,
    /// Served from the store.
    Hit,
    /// Served from the store while a background refresh runs.
    Revalidating,
}

impl CacheStatus {
    /// Header value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Miss => "MISS",
            Self::Hit => "HIT",
            Self::Revalidating => "REVALIDATING",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MISS" => Ok(Self::Miss),
            "HIT" => Ok(Self::Hit),
            "REVALIDATING" => Ok(Self::Revalidating),
            other => Err(format!("unknown cache status: {}", other)),
        }
    }
}

/// A response as kept by the store.
///
/// Metadata travels as headers (see [`header_names`]) so the stored value is
/// a plain response any key-value store can hold. Entries are only ever
/// replaced whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    /// HTTP status code.
    pub status: u16,
    /// Header pairs, names lower-cased.
    pub headers: Vec<(String, String)>,
    /// Response body.
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,
}

impl CachedEntry {
    /// Snapshot a response. Non-UTF-8 header values are dropped.
    pub fn from_response(response: &ProxyResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        Self {
            status: response.status.as_u16(),
            headers,
            body: response.body.clone(),
        }
    }

    /// Rebuild the response.
    pub fn to_response(&self) -> ProxyResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        ProxyResponse::new(status, headers, self.body.clone())
    }

    /// First value of a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Stored cache status.
    pub fn cache_status(&self) -> Option<CacheStatus> {
        self.header(header_names::CACHE_STATUS)?.parse().ok()
    }

    /// Stale-at timestamp in epoch millis.
    pub fn stale_at(&self) -> Option<u64> {
        self.header(header_names::STALE_AT)?.trim().parse().ok()
    }

    /// When the in-flight revalidation was scheduled, in epoch millis.
    pub fn revalidation_started(&self) -> Option<u64> {
        self.header(header_names::REVALIDATION_STARTED)?.trim().parse().ok()
    }

    /// The origin's original `Cache-Control`.
    pub fn origin_cache_control(&self) -> Option<&str> {
        self.header(header_names::ORIGIN_CACHE_CONTROL)
    }

    /// Client-facing `Cache-Control`.
    pub fn client_cache_control(&self) -> Option<&str> {
        self.header(header_names::CLIENT_CACHE_CONTROL)
    }

    /// Edge `Cache-Control` the entry was stored with.
    pub fn edge_cache_control(&self) -> Option<&str> {
        self.header(http::header::CACHE_CONTROL.as_str())
    }

    /// Parsed origin directives.
    pub fn origin_directives(&self) -> CacheControl {
        self.origin_cache_control()
            .map(CacheControl::parse)
            .unwrap_or_default()
    }

    /// A copy of this entry carrying a different cache status.
    pub fn with_cache_status(&self, status: CacheStatus) -> Self {
        self.with_header(header_names::CACHE_STATUS, status.to_string())
    }

    /// A copy marked `REVALIDATING`, stamped with the time the refresh was scheduled.
    pub fn mark_revalidating(&self, now_millis: u64) -> Self {
        self.with_cache_status(CacheStatus::Revalidating)
            .with_header(header_names::REVALIDATION_STARTED, now_millis.to_string())
    }

    fn with_header(&self, name: &str, value: String) -> Self {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(name))
            .cloned()
            .collect();
        headers.push((name.to_string(), value));

        Self {
            status: self.status,
            headers,
            body: self.body.clone(),
        }
    }

    /// Serialize for byte-oriented stores.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from byte-oriented stores.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

mod body_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
