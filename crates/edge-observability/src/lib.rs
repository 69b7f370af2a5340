//! Observability for the SWR edge proxy.
//!
//! This crate provides:
//! - `init_logging` - Installs the `tracing` subscriber (JSON or human)
//! - `MetricsCollector` / `CacheMetrics` - Per-request cache metrics

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;

// Re-export RequestId from edge-core for convenience
pub use edge_core::RequestId;
