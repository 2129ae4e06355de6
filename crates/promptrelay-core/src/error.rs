//! Unified error types for the Promptrelay gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Main error type for gateway operations.
///
/// The `Display` strings of the rejection variants are part of the wire
/// contract: clients distinguish rejection causes by them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// Request envelope carried no messages.
    #[error("no messages")]
    EmptyMessages,

    /// Route token did not resolve to an absolute http(s) URL.
    #[error("malformed route token: {0}")]
    InvalidTarget(String),

    /// Per-client concurrency cap reached.
    #[error("too many concurrent requests")]
    AdmissionRejected,

    /// Resolved URL is not in the whitelist.
    #[error("URL not permitted")]
    WhitelistRejected,

    /// Upstream request failed (connect, send or stream error).
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Ciphertext could not be decrypted. Always recovered by forwarding the
    /// original content; never surfaced to the caller.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem watch setup failed.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unclassified error with message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Serialize for GatewayError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<String> for GatewayError {
    fn from(s: String) -> Self {
        GatewayError::Internal(s)
    }
}

impl From<&str> for GatewayError {
    fn from(s: &str) -> Self {
        GatewayError::Internal(s.to_string())
    }
}

impl GatewayError {
    /// HTTP status this error maps to at the edge.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyMessages | Self::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            Self::AdmissionRejected => StatusCode::TOO_MANY_REQUESTS,
            Self::WhitelistRejected => StatusCode::FORBIDDEN,
            Self::Upstream(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Decryption(_)
            | Self::Config(_)
            | Self::Watch(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
