//! Cache key derivation.

use std::fs;

use anyhow::{Context, Result};
use edge_cache::{CacheKey, Sha256Hasher};
use serde::Serialize;
use url::Url;

use super::KeyArgs;
use crate::output::Output;

#[derive(Debug, Serialize)]
struct KeyReport<'a> {
    url: &'a str,
    body_bytes: usize,
    key: &'a str,
}

/// Derive the key the proxy uses for `url` and `body`.
///
/// The URL is normalized the same way inbound requests are and returned
/// alongside the key.
pub fn derive_key(url: &str, body: &[u8]) -> Result<(Url, CacheKey)> {
    let url = Url::parse(url).with_context(|| format!("invalid URL: {}", url))?;
    let key = CacheKey::derive(url.as_str(), body, &Sha256Hasher);
    Ok((url, key))
}

/// Run the key command.
pub fn run(args: KeyArgs, output: &Output) -> Result<()> {
    let body = match (&args.body, &args.body_file) {
        (Some(text), _) => text.as_bytes().to_vec(),
        (None, Some(path)) => fs::read(path)
            .with_context(|| format!("failed to read body from {}", path.display()))?,
        (None, None) => Vec::new(),
    };
    output.debug(&format!("body is {} bytes", body.len()));

    let (url, key) = derive_key(&args.url, &body)?;

    if output.is_json() {
        output.json(&KeyReport {
            url: url.as_str(),
            body_bytes: body.len(),
            key: key.as_str(),
        });
        return Ok(());
    }

    println!("{}", key);
    Ok(())
}
