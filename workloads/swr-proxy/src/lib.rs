//! SWR caching proxy - Spin HTTP component.
//!
//! Accepts `POST` requests carrying JSON and an origin-designating header,
//! answers from the key-value store when possible and refreshes stale
//! entries after the response has been sent.

#[cfg(target_arch = "wasm32")]
mod component;

use edge_core::{ConfigError, ProxyConfig};
use http::{HeaderMap, HeaderName, HeaderValue};

/// Configuration bundled into the component.
pub const BUNDLED_CONFIG: &str = include_str!("../swr-proxy.toml");

/// Parse the bundled configuration, falling back to defaults on error.
///
/// The error is returned alongside so it can be logged once logging is up.
pub fn load_config(source: &str) -> (ProxyConfig, Option<ConfigError>) {
    match ProxyConfig::from_toml_str(source) {
        Ok(config) => (config, None),
        Err(e) => (ProxyConfig::default(), Some(e)),
    }
}

/// Build a header map from host header entries, skipping invalid ones.
pub fn to_header_map(entries: Vec<(String, Vec<u8>)>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in entries {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(&value),
        ) else {
            continue;
        };
        headers.append(name, value);
    }
    headers
}

/// Connection-scoped headers the host manages itself.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "host",
    "http2-settings",
];

/// Flatten a header map into host header entries.
pub fn to_header_list(headers: &HeaderMap) -> Vec<(String, Vec<u8>)> {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().to_owned(), value.as_bytes().to_vec()))
        .collect()
}

/// Host header entries for an outgoing response, without hop-by-hop headers.
pub fn to_response_header_list(headers: &HeaderMap) -> Vec<(String, Vec<u8>)> {
    to_header_list(headers)
        .into_iter()
        .filter(|(name, _)| !HOP_BY_HOP_HEADERS.contains(&name.as_str()))
        .collect()
}
