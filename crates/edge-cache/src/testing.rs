//! Scripted origin used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use edge_core::ProxyResponse;
use edge_data::{FetchError, OriginClient, OriginRequest};
use http::{HeaderMap, HeaderValue, StatusCode};

/// Answers with a scripted sequence of responses; the last one repeats.
pub(crate) struct ScriptedOrigin {
    script: Mutex<Vec<Option<ProxyResponse>>>,
    sent: Mutex<Vec<OriginRequest>>,
    calls: AtomicUsize,
}

impl ScriptedOrigin {
    pub(crate) fn respond(status: StatusCode, headers: HeaderMap, body: &[u8]) -> Self {
        Self {
            script: Mutex::new(vec![Some(ProxyResponse::new(status, headers, body.to_vec()))]),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn cacheable(cache_control: &'static str, body: &[u8]) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("cache-control", HeaderValue::from_static(cache_control));
        Self::respond(StatusCode::OK, headers, body)
    }

    pub(crate) fn failing() -> Self {
        Self {
            script: Mutex::new(vec![None]),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a cacheable response for the next call.
    pub(crate) fn then_cacheable(self, cache_control: &'static str, body: &[u8]) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("cache-control", HeaderValue::from_static(cache_control));
        self.script
            .lock()
            .unwrap()
            .push(Some(ProxyResponse::new(StatusCode::OK, headers, body.to_vec())));
        self
    }

    /// Queue a transport failure for the next call.
    pub(crate) fn then_fail(self) -> Self {
        self.script.lock().unwrap().push(None);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<OriginRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OriginClient for ScriptedOrigin {
    async fn send(&self, request: OriginRequest) -> Result<ProxyResponse, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(request);

        let script = self.script.lock().unwrap();
        let index = call.min(script.len() - 1);
        script[index]
            .clone()
            .ok_or_else(|| FetchError::RequestError("connection refused".to_string()))
    }
}
