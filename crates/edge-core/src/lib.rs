//! Core abstractions for the SWR edge proxy.
//!
//! This crate provides the fundamental types:
//! - `ProxyConfig` - Proxy configuration loaded from TOML/JSON
//! - `ProxyRequest` / `ProxyResponse` - Buffered request and response values
//! - `RequestId` - Request correlation
//! - `Clock` - Wall-clock abstraction with a manual clock for tests

mod clock;
mod config;
mod context;
mod response;

pub use clock::*;
pub use config::*;
pub use context::*;
pub use response::*;

pub use http;
pub use url;
