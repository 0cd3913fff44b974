//! Upstream transit API error types.

/// Errors from fetching or decoding an upstream feed.
///
/// Only [`TransitError::NotConfigured`] is ever returned for a multi-source
/// query; the other variants describe a single failed source and are
/// skipped by the aggregators.
#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    /// A required credential is missing; no request was attempted
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// HTTP request failed (connection, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request exceeded the configured timeout
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Upstream answered with a non-success status
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    /// Protobuf payload could not be decoded
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// JSON payload could not be decoded
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// A feed group name with no URL in the routing table
    #[error("unknown feed group: {0}")]
    UnknownFeed(String),

    /// The request limiter was closed, so no request could be made
    #[error("request limiter closed")]
    LimiterClosed,
}

impl TransitError {
    /// Whether the error is a configuration problem rather than an upstream one.
    pub fn is_config(&self) -> bool {
        matches!(self, TransitError::NotConfigured(_))
    }
}

impl From<serde_json::Error> for TransitError {
    fn from(err: serde_json::Error) -> Self {
        TransitError::Json {
            message: err.to_string(),
        }
    }
}
