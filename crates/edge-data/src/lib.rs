//! Origin access for the SWR edge proxy.
//!
//! This crate provides:
//! - `OriginClient` - The HTTP client boundary used to reach the origin
//! - `OriginRequest` - Uncached outbound requests with a cache-busting parameter
//! - `SpinOriginClient` - Spin outbound HTTP implementation (wasm32 only)

mod client;
mod error;
mod request;

pub use client::*;
pub use error::*;
pub use request::*;
