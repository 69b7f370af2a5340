//! Inbound request checks for the SWR edge proxy.
//!
//! This crate provides:
//! - `RequestValidator` - Method, origin header, content type and body size checks
//! - `ValidationError` - Rejections mapped to HTTP status codes
//! - `OriginAllowlist` - Pattern-based host filtering for origins
//!
//! # Example
//!
//! ```ignore
//! use edge_security::{OriginAllowlist, RequestValidator};
//!
//! let validator = RequestValidator::new("x-swr-origin")
//!     .with_max_body_bytes(1024 * 1024)
//!     .with_allowlist(
//!         OriginAllowlist::new()
//!             .allow_host("api.example.com")
//!             .allow_pattern("*.internal.example.com"),
//!     );
//!
//! match validator.validate(&method, &headers, body.len()) {
//!     Ok(origin) => { /* forward */ }
//!     Err(e) => return e.to_response(),
//! }
//! ```

mod allowlist;
mod validation;

pub use allowlist::*;
pub use validation::*;
