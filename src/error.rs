//! Error types for repaint calls.

/// Errors that can occur while repainting an image.
///
/// The first four variants are the call-time taxonomy every failed
/// [`RepaintResult`](crate::RepaintResult) falls into; the rest cover
/// configuration, caller input and local helpers.
#[derive(Debug, thiserror::Error)]
pub enum RepaintError {
    /// DNS, TLS, timeout, connection reset or body read failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The endpoint answered with a status other than 200.
    #[error("server error: HTTP {status}")]
    Server {
        /// Numeric HTTP status code.
        status: u16,
    },

    /// The response body was not JSON, or lacked an expected field or index.
    #[error("malformed response at `{path}`: {detail}")]
    MalformedResponse {
        /// JSON path of the lookup that failed (`$` for the whole body).
        path: String,
        /// What was wrong at that path.
        detail: String,
    },

    /// Any other unexpected failure during processing.
    #[error("unknown error: {0}")]
    Unknown(String),

    /// API key missing.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The call was cancelled before it was dispatched.
    #[error("repaint cancelled before dispatch")]
    Cancelled,

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., reading the source photo or saving the result).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepaintError {
    pub(crate) fn malformed(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Classifies a transport-level reqwest failure.
    ///
    /// The URL is stripped because it carries the API key.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_builder() {
            Self::Unknown(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }

    /// Short, stable classification name (e.g. for JSON output or metrics).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection_error",
            Self::Server { .. } => "server_error",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Unknown(_) => "unknown_error",
            Self::Auth(_) => "auth",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Cancelled => "cancelled",
            Self::Decode(_) => "decode",
            Self::Io(_) => "io",
        }
    }

    /// Returns true if a caller-side retry could plausibly succeed.
    ///
    /// The client never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Server { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for repaint operations.
pub type Result<T> = std::result::Result<T, RepaintError>;
