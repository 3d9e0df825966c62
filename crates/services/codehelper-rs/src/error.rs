//! Error types for codehelper_rs.

use thiserror::Error;

/// Result type alias for codehelper_rs operations.
pub type Result<T> = std::result::Result<T, CodehelperError>;

/// Error type for codehelper_rs operations.
#[derive(Debug, Error)]
pub enum CodehelperError {
    /// HTTP transport error (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An SSE event could not be turned into a chunk.
    #[error("SSE parse error: {0}")]
    Parse(String),

    /// Unexpected HTTP status code.
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The server finished the response body.
    ///
    /// Signalled by the transport at end of stream and classified as a normal
    /// close, so handlers never receive it.
    #[error("Event stream ended")]
    StreamEnded,

    /// The chat endpoint answered with something other than an event stream.
    #[error("Expected text/event-stream, got {0}")]
    InvalidContentType(String),

    /// The backend processed the request and reported a failure in the body.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Request rejected before it was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CodehelperError {
    /// True for event payloads that could not be extracted.
    ///
    /// These never end a stream.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// True for failures of the connection itself rather than of its content.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::UnexpectedStatus { .. } | Self::InvalidContentType(_)
        )
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
