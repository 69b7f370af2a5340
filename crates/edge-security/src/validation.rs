//! Inbound request validation.

use edge_core::{ProxyConfig, ProxyResponse};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use url::Url;

use crate::allowlist::{AllowlistError, OriginAllowlist};

/// Reasons an inbound request is rejected before any caching happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("missing {0} header")]
    MissingOriginHeader(String),

    #[error("invalid origin URL: {0}")]
    InvalidOrigin(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("request body too large: {size} bytes (limit {limit})")]
    BodyTooLarge { size: u64, limit: u64 },

    #[error("origin not allowed: {0}")]
    OriginNotAllowed(#[from] AllowlistError),
}

impl ValidationError {
    /// HTTP status for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingOriginHeader(_) | Self::InvalidOrigin(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Plain-text response for the client.
    pub fn to_response(&self) -> ProxyResponse {
        let mut response = ProxyResponse::text(self.status(), self.to_string());
        if let Self::MethodNotAllowed(_) = self {
            response
                .headers
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}

/// Checks inbound requests and extracts the origin they target.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    origin_header: String,
    max_body_bytes: u64,
    allowlist: OriginAllowlist,
}

impl RequestValidator {
    /// Validator reading the origin from `origin_header`, no body limit and
    /// a permissive allowlist.
    pub fn new(origin_header: impl Into<String>) -> Self {
        Self {
            origin_header: origin_header.into(),
            max_body_bytes: u64::MAX,
            allowlist: OriginAllowlist::permissive(),
        }
    }

    /// Build from the proxy configuration.
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            origin_header: config.origin_header.clone(),
            max_body_bytes: config.max_body_bytes,
            allowlist: OriginAllowlist::from_config(&config.allowlist),
        }
    }

    /// Set the body size limit.
    pub fn with_max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Set the origin allowlist.
    pub fn with_allowlist(mut self, allowlist: OriginAllowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Validate a request and return the origin base URL.
    pub fn validate(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body_len: usize,
    ) -> Result<Url, ValidationError> {
        if method != Method::POST {
            return Err(ValidationError::MethodNotAllowed(method.to_string()));
        }

        let origin = headers
            .get(self.origin_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ValidationError::MissingOriginHeader(self.origin_header.clone()))?;
        let origin = Url::parse(origin)
            .map_err(|e| ValidationError::InvalidOrigin(format!("{}: {}", origin, e)))?;

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !is_json(content_type) {
            return Err(ValidationError::UnsupportedContentType(
                content_type.to_string(),
            ));
        }

        let size = body_len as u64;
        if size > self.max_body_bytes {
            return Err(ValidationError::BodyTooLarge {
                size,
                limit: self.max_body_bytes,
            });
        }

        self.allowlist.check(&origin)?;
        Ok(origin)
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
