//! Platform gateway error types

use thiserror::Error;

/// Errors returned by platform collaborator calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The platform answered with a non-success status
    #[error("Platform returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// The request never produced a response (connect, timeout, TLS)
    #[error("Platform request failed: {0}")]
    Transport(String),

    /// The response could not be interpreted
    #[error("Invalid platform response: {0}")]
    InvalidResponse(String),

    /// No stack or region API is known for the space
    #[error("No platform route configured for space {0}")]
    NoRoute(String),
}
