//! Outbound origin requests.

use edge_core::ProxyRequest;
use http::{header, HeaderMap, HeaderValue, Method};
use url::Url;

/// A request to the origin.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    /// HTTP method.
    pub method: Method,
    /// Full URL including the cache-busting parameter.
    pub url: Url,
    /// Outbound headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Vec<u8>,
}

impl OriginRequest {
    /// Build the uncached upstream request for an inbound request.
    ///
    /// Same method and body, JSON content type, and `bust_param=now_millis`
    /// appended so no intermediate cache can answer this fetch.
    pub fn uncached(
        request: &ProxyRequest,
        bust_param: &str,
        now_millis: u64,
        cache_control_hint: Option<&str>,
    ) -> Self {
        let mut url = request.url.clone();
        url.query_pairs_mut()
            .append_pair(bust_param, &now_millis.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(hint) = cache_control_hint.filter(|h| !h.is_empty()) {
            if let Ok(value) = HeaderValue::from_str(hint) {
                headers.insert(header::CACHE_CONTROL, value);
            }
        }
        if let Some(accept) = request.headers.get(header::ACCEPT) {
            headers.insert(header::ACCEPT, accept.clone());
        }
        if let Ok(value) = HeaderValue::from_str(&request.request_id.0) {
            headers.insert("x-request-id", value);
        }

        Self {
            method: request.method.clone(),
            url,
            headers,
            body: request.body.clone(),
        }
    }
}
