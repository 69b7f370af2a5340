//! Origin HTTP client boundary.

use async_trait::async_trait;
use edge_core::ProxyResponse;

use crate::error::FetchError;
use crate::request::OriginRequest;

/// HTTP client used to reach the origin.
///
/// A non-2xx answer is a successful send: it comes back as a response. Only
/// transport failures are errors.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait OriginClient: Send + Sync {
    /// Send the request and buffer the whole response.
    async fn send(&self, request: OriginRequest) -> Result<ProxyResponse, FetchError>;
}

/// Origin client backed by Spin's outbound HTTP.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinOriginClient;

#[cfg(target_arch = "wasm32")]
#[async_trait(?Send)]
impl OriginClient for SpinOriginClient {
    async fn send(&self, request: OriginRequest) -> Result<ProxyResponse, FetchError> {
        use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
        use spin_sdk::http::{Method as SpinMethod, Request, Response};

        let method = match request.method.as_str() {
            "GET" => SpinMethod::Get,
            "POST" => SpinMethod::Post,
            "PUT" => SpinMethod::Put,
            "PATCH" => SpinMethod::Patch,
            "DELETE" => SpinMethod::Delete,
            "HEAD" => SpinMethod::Head,
            "OPTIONS" => SpinMethod::Options,
            other => SpinMethod::Other(other.to_string()),
        };

        let mut builder = Request::builder();
        builder.method(method).uri(request.url.as_str());
        for (name, value) in &request.headers {
            if let Ok(value) = value.to_str() {
                builder.header(name.as_str(), value);
            }
        }
        let outbound = builder.body(request.body).build();

        let response: Response = spin_sdk::http::send(outbound)
            .await
            .map_err(|e| FetchError::RequestError(e.to_string()))?;

        let status = StatusCode::from_u16(*response.status())
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) else {
                continue;
            };
            headers.append(name, value);
        }

        Ok(ProxyResponse::new(status, headers, response.into_body()))
    }
}
