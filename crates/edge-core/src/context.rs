//! Inbound request context.

use http::{HeaderMap, Method};
use url::Url;

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Reuse the caller's `x-request-id` when present, otherwise generate one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(Self::from_string)
            .unwrap_or_else(Self::generate)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A buffered request destined for the origin.
///
/// The body is read once up front because it is used twice: for the cache key
/// and for forwarding.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// HTTP method.
    pub method: Method,
    /// Upstream URL (origin base joined with the inbound path and query).
    pub url: Url,
    /// Inbound headers.
    pub headers: HeaderMap,
    /// Buffered request body.
    pub body: Vec<u8>,
}

impl ProxyRequest {
    /// Create a new request.
    pub fn new(method: Method, url: Url, body: impl Into<Vec<u8>>) -> Self {
        Self {
            request_id: RequestId::generate(),
            method,
            url,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Replace the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.request_id = RequestId::from_headers(&headers);
        self.headers = headers;
        self
    }

    /// Get a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Join an origin base URL with an inbound path and query.
///
/// `https://api.example.com/v1` + `/graphql?op=x` gives
/// `https://api.example.com/v1/graphql?op=x`.
pub fn upstream_url(origin: &Url, path_with_query: &str) -> Url {
    let mut url = origin.clone();
    let (path, query) = match path_with_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_with_query, None),
    };

    if !path.is_empty() && path != "/" {
        let base = origin.path().trim_end_matches('/');
        url.set_path(&format!("{}/{}", base, path.trim_start_matches('/')));
    }
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.set_query(Some(query));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "abc123".parse().unwrap());
        assert_eq!(RequestId::from_headers(&headers).0, "abc123");
    }

    #[test]
    fn test_request_id_generated_when_missing() {
        let a = RequestId::from_headers(&HeaderMap::new());
        let b = RequestId::from_headers(&HeaderMap::new());
        assert_eq!(a.0.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_upstream_url_joins_path_and_query() {
        let origin = Url::parse("https://api.example.com/v1").unwrap();
        let url = upstream_url(&origin, "/graphql?op=products");
        assert_eq!(url.as_str(), "https://api.example.com/v1/graphql?op=products");
    }

    #[test]
    fn test_upstream_url_root_path_keeps_origin() {
        let origin = Url::parse("https://api.example.com/graphql").unwrap();
        assert_eq!(
            upstream_url(&origin, "/").as_str(),
            "https://api.example.com/graphql"
        );
    }
}
