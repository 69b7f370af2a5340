//! The Spin HTTP handler.

use std::sync::Arc;

use futures::SinkExt;
use http::{HeaderValue, Method, StatusCode};
use spin_sdk::http::{Fields, IncomingRequest, Method as SpinMethod, OutgoingResponse, ResponseOutparam};
use spin_sdk::http_component;

use edge_cache::{SpinKvStore, SwrCache};
use edge_core::{upstream_url, ProxyRequest, ProxyResponse, RequestId};
use edge_data::SpinOriginClient;
use edge_executor::DeferredWork;
use edge_observability::{init_logging, MetricsCollector};
use edge_security::RequestValidator;

use crate::{load_config, to_header_map, to_response_header_list, BUNDLED_CONFIG};

/// Main HTTP handler.
///
/// The response is handed to the host before background work runs, so
/// revalidation never delays the client.
#[http_component]
async fn handle(req: IncomingRequest, response_out: ResponseOutparam) {
    let (config, config_error) = load_config(BUNDLED_CONFIG);
    init_logging(&config.logging);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "invalid bundled config, using defaults");
    }

    let method = convert_method(req.method());
    let path_with_query = req.path_with_query().unwrap_or_default();
    let headers = to_header_map(req.headers().entries());
    let request_id = RequestId::from_headers(&headers);
    let mut metrics = MetricsCollector::new(request_id.clone());

    let body = match req.into_body().await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = ?e, "failed to read request body");
            let response = ProxyResponse::text(StatusCode::BAD_REQUEST, "unreadable request body");
            send_response(response_out, response, &request_id).await;
            metrics.finalize(Some(400)).emit();
            return;
        }
    };

    let validator = RequestValidator::from_config(&config);
    let origin = match validator.validate(&method, &headers, body.len()) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::info!(request_id = %request_id, error = %e, "request rejected");
            let status = e.status().as_u16();
            send_response(response_out, e.to_response(), &request_id).await;
            metrics.finalize(Some(status)).emit();
            return;
        }
    };

    let request = ProxyRequest::new(method, upstream_url(&origin, &path_with_query), body)
        .with_headers(headers);

    let work = Arc::new(DeferredWork::new());
    let cache = SwrCache::new(
        Arc::new(SpinKvStore::new(config.store.name.clone())),
        Arc::new(SpinOriginClient),
        Arc::clone(&work),
    )
    .with_config(&config);

    let served = cache.handle(&request).await;
    metrics.record_cache(served.key.as_str(), served.status);
    metrics.record_origin(served.origin_status.map(|s| s.as_u16()), served.origin_fetch);
    metrics.record_revalidation(served.revalidation_triggered);

    let status = served.response.status.as_u16();
    send_response(response_out, served.response, &request_id).await;

    let completed = work.run_all().await;
    if completed > 0 {
        tracing::debug!(request_id = %request_id, completed, "background work finished");
    }
    metrics.finalize(Some(status)).emit();
}

/// Write a buffered response to the host.
async fn send_response(response_out: ResponseOutparam, mut response: ProxyResponse, request_id: &RequestId) {
    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers.insert("x-request-id", value);
    }

    let headers = Fields::new();
    for (name, value) in to_response_header_list(&response.headers) {
        if let Err(e) = headers.append(&name, &value) {
            tracing::warn!(request_id = %request_id, header = %name, error = ?e, "response header rejected");
        }
    }
    let outgoing = OutgoingResponse::new(headers);
    if outgoing.set_status_code(response.status.as_u16()).is_err() {
        tracing::warn!(request_id = %request_id, status = response.status.as_u16(), "invalid status code");
    }

    let mut body = outgoing.take_body();
    response_out.set(outgoing);
    if let Err(e) = body.send(response.body).await {
        tracing::warn!(request_id = %request_id, error = ?e, "failed to write response body");
    }
}

fn convert_method(method: SpinMethod) -> Method {
    match method {
        SpinMethod::Get => Method::GET,
        SpinMethod::Post => Method::POST,
        SpinMethod::Put => Method::PUT,
        SpinMethod::Patch => Method::PATCH,
        SpinMethod::Delete => Method::DELETE,
        SpinMethod::Head => Method::HEAD,
        SpinMethod::Options => Method::OPTIONS,
        SpinMethod::Connect => Method::CONNECT,
        SpinMethod::Trace => Method::TRACE,
        SpinMethod::Other(other) => Method::from_bytes(other.as_bytes()).unwrap_or(Method::GET),
    }
}
