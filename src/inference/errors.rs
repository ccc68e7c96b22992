//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to
//! build meaningful log entries.

use thiserror::Error;

/// Error categories reported by the server in `error_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerErrorKind {
    /// The request was rejected before generation (prompt too long, bad params).
    Validation,
    /// Generation failed on the model shards.
    Generation,
    /// The server's queue is full.
    Overloaded,
    /// The stream ended without a final message.
    IncompleteGeneration,
    Other(String),
}

impl ServerErrorKind {
    /// Classify from the `error_type` field, falling back to the HTTP status.
    pub fn classify(error_type: Option<&str>, status: Option<u16>) -> Self {
        match error_type {
            Some("validation") => ServerErrorKind::Validation,
            Some("generation") => ServerErrorKind::Generation,
            Some("overloaded") => ServerErrorKind::Overloaded,
            Some("incomplete_generation") => ServerErrorKind::IncompleteGeneration,
            Some(other) => ServerErrorKind::Other(other.to_string()),
            None => match status {
                Some(422) => ServerErrorKind::Validation,
                Some(424) => ServerErrorKind::Generation,
                Some(429) => ServerErrorKind::Overloaded,
                Some(code) => ServerErrorKind::Other(format!("http_{code}")),
                None => ServerErrorKind::Other("unknown".to_string()),
            },
        }
    }
}

impl std::fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerErrorKind::Validation => f.write_str("validation"),
            ServerErrorKind::Generation => f.write_str("generation"),
            ServerErrorKind::Overloaded => f.write_str("overloaded"),
            ServerErrorKind::IncompleteGeneration => f.write_str("incomplete_generation"),
            ServerErrorKind::Other(other) => f.write_str(other),
        }
    }
}

/// Errors that can occur during inference operations.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the server failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The server did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// The server reported a structured error, either as a non-2xx response
    /// or in-band on a stream (`status` is `None` for the latter).
    #[error("server {kind} error: {message}")]
    ServerError {
        status: Option<u16>,
        kind: ServerErrorKind,
        message: String,
    },

    /// Non-2xx response whose body was not a structured error.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// SSE stream read or event-level error.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// A 2xx response body could not be decoded.
    #[error("failed to decode response: {reason}")]
    DecodeError { reason: String },

    /// The HTTP client could not be built.
    #[error("client setup failed: {reason}")]
    ClientSetup { reason: String },
}

impl InferenceError {
    /// Whether the server rejected the request because its queue is full.
    pub fn is_overloaded(&self) -> bool {
        matches!(
            self,
            InferenceError::ServerError {
                kind: ServerErrorKind::Overloaded,
                ..
            }
        )
    }

    /// Map a `reqwest` send/read failure onto the error taxonomy.
    pub(crate) fn from_reqwest(endpoint: &str, timeout_secs: u64, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InferenceError::Timeout {
                duration_secs: timeout_secs,
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }
}
