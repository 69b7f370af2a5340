//! Explain how an origin `Cache-Control` header is translated.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use edge_cache::{CacheControl, ResolvedPolicies};
use serde::Serialize;

use super::ExplainArgs;
use crate::output::{cacheability_badge, format_seconds, Output};

/// Machine-readable explanation.
#[derive(Debug, Serialize)]
pub struct Explanation {
    pub cache_control: String,
    pub now: u64,
    pub directives: CacheControl,
    pub cacheable: bool,
    pub edge_policy: Option<String>,
    pub stale_at: Option<u64>,
    pub stale_at_rfc3339: Option<String>,
    pub revalidation_deadline: Option<u64>,
    pub client_policy: String,
}

impl Explanation {
    /// Resolve `cache_control` at `now` (epoch millis).
    pub fn build(cache_control: &str, now: u64) -> Self {
        let resolved = ResolvedPolicies::resolve(cache_control, now);
        let stale_at = resolved.edge.as_ref().map(|edge| edge.stale_at);

        Self {
            cache_control: cache_control.to_string(),
            now,
            directives: resolved.directives,
            cacheable: resolved.edge.is_some(),
            edge_policy: resolved.edge.map(|edge| edge.value),
            stale_at,
            stale_at_rfc3339: stale_at.and_then(to_rfc3339),
            revalidation_deadline: stale_at
                .and_then(|at| resolved.directives.revalidation_deadline(at)),
            client_policy: resolved.client,
        }
    }
}

/// Run the explain command.
pub fn run(args: ExplainArgs, output: &Output) -> Result<()> {
    let now = match args.now {
        Some(now) => now,
        None => u64::try_from(Utc::now().timestamp_millis())
            .context("system clock is before the Unix epoch")?,
    };
    output.debug(&format!("evaluating at {}", now));

    let explanation = Explanation::build(&args.cache_control, now);

    if output.is_json() {
        output.json(&explanation);
        return Ok(());
    }

    output.header("Origin directives");
    output.kv("max-age", &format_seconds(explanation.directives.max_age));
    output.kv("s-maxage", &format_seconds(explanation.directives.s_maxage));
    output.kv(
        "stale-while-revalidate",
        &format_seconds(explanation.directives.stale_while_revalidate),
    );

    output.header("Edge");
    output.kv("decision", &cacheability_badge(explanation.cacheable));
    match (&explanation.edge_policy, explanation.stale_at) {
        (Some(policy), Some(stale_at)) => {
            output.kv("cache-control", policy);
            let when = explanation
                .stale_at_rfc3339
                .clone()
                .unwrap_or_else(|| stale_at.to_string());
            output.kv("stale at", &when);
            if let Some(deadline) = explanation.revalidation_deadline {
                output.kv("earliest revalidation retry", &deadline.to_string());
            }
        }
        _ => output.warn("origin sent no s-maxage; responses are passed through uncached"),
    }

    output.header("Client");
    output.kv("cache-control", &explanation.client_policy);

    Ok(())
}

fn to_rfc3339(millis: u64) -> Option<String> {
    let millis = i64::try_from(millis).ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|at| at.to_rfc3339())
}
