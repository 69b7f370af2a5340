//! Per-request cache metrics.

use std::time::{Duration, Instant};

use edge_core::RequestId;
use serde::{Deserialize, Serialize};

/// Cache metrics for a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Request ID for correlation.
    pub request_id: String,
    /// Cache key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Cache status label (MISS, HIT, REVALIDATING).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_status: Option<String>,
    /// Origin status on the MISS path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_status: Option<u16>,
    /// Foreground origin fetch duration (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_fetch_us: Option<u64>,
    /// Whether this request scheduled a revalidation.
    pub revalidation_triggered: bool,
    /// Total request duration (microseconds).
    pub total_duration_us: u64,
    /// HTTP status code sent to the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Collector for cache metrics.
#[derive(Debug)]
pub struct MetricsCollector {
    request_id: RequestId,
    start: Instant,
    key: Option<String>,
    cache_status: Option<String>,
    origin_status: Option<u16>,
    origin_fetch: Option<Duration>,
    revalidation_triggered: bool,
}

impl MetricsCollector {
    /// Start collecting for a request.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            start: Instant::now(),
            key: None,
            cache_status: None,
            origin_status: None,
            origin_fetch: None,
            revalidation_triggered: false,
        }
    }

    /// Record the cache key and status label.
    pub fn record_cache(&mut self, key: impl Into<String>, status: impl ToString) {
        self.key = Some(key.into());
        self.cache_status = Some(status.to_string());
    }

    /// Record the foreground origin fetch.
    pub fn record_origin(&mut self, status: Option<u16>, duration: Option<Duration>) {
        self.origin_status = status;
        self.origin_fetch = duration;
    }

    /// Record that a revalidation was scheduled.
    pub fn record_revalidation(&mut self, triggered: bool) {
        self.revalidation_triggered = triggered;
    }

    /// Get total elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finalize and return the metrics.
    pub fn finalize(self, status_code: Option<u16>) -> CacheMetrics {
        CacheMetrics {
            request_id: self.request_id.to_string(),
            key: self.key,
            cache_status: self.cache_status,
            origin_status: self.origin_status,
            origin_fetch_us: self.origin_fetch.map(|d| d.as_micros() as u64),
            revalidation_triggered: self.revalidation_triggered,
            total_duration_us: self.start.elapsed().as_micros() as u64,
            status_code,
        }
    }
}

impl CacheMetrics {
    /// Emit as a single `info` event.
    pub fn emit(&self) {
        tracing::info!(
            request_id = %self.request_id,
            key = self.key.as_deref(),
            cache_status = self.cache_status.as_deref(),
            origin_status = self.origin_status,
            origin_fetch_us = self.origin_fetch_us,
            revalidation_triggered = self.revalidation_triggered,
            total_duration_us = self.total_duration_us,
            status_code = self.status_code,
            "request complete"
        );
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = vec![format!("Request: {}", self.request_id)];

        if let Some(status) = &self.cache_status {
            lines.push(format!("  Cache: {}", status));
        }
        if let Some(key) = &self.key {
            lines.push(format!("  Key: {}", key));
        }
        if let Some(fetch) = self.origin_fetch_us {
            let status = self
                .origin_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "FAILED".to_string());
            lines.push(format!(
                "  Origin: {} in {}us ({:.2}ms)",
                status,
                fetch,
                fetch as f64 / 1000.0
            ));
        }
        if self.revalidation_triggered {
            lines.push("  Revalidation scheduled".to_string());
        }
        lines.push(format!(
            "  Total: {}us ({:.2}ms)",
            self.total_duration_us,
            self.total_duration_us as f64 / 1000.0
        ));

        lines.join("\n")
    }
}
