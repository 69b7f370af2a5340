//! Origin fetch error types.

use thiserror::Error;

/// Errors that can occur when calling the origin.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Failed to send the request.
    #[error("Request failed: {0}")]
    RequestError(String),

    /// The origin answered with something that is not valid HTTP.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
