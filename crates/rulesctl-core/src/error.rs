//! Error types for rules protocol operations.

use thiserror::Error;

/// Primary error type for rules protocol operations.
#[derive(Debug, Error)]
pub enum RulesError {
    /// The request never produced an HTTP response (connection, TLS, timeout).
    #[error("transport failure during {operation}: {message}")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Transport-level failure detail.
        message: String,
    },
    /// The server answered with a non-success status.
    #[error("server rejected {operation} with status {status}: {body}")]
    Server {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Diagnostic message extracted from the response body.
        body: String,
    },
    /// The encoded rules payload was not valid base64.
    #[error("encoded rules blob is malformed")]
    Decode {
        /// Underlying base64 error.
        #[source]
        source: base64::DecodeError,
    },
    /// A version string or marker did not match `MAJOR.MINOR`.
    #[error("invalid rules version '{value}'")]
    VersionParse {
        /// Offending input.
        value: String,
    },
    /// A success response did not carry the expected payload.
    #[error("unexpected {operation} response: {detail}")]
    InvalidResponse {
        /// Operation identifier.
        operation: &'static str,
        /// What was wrong with the payload.
        detail: String,
    },
}

impl RulesError {
    /// Build a transport error from any displayable failure.
    pub fn transport(operation: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation,
            message: error.to_string(),
        }
    }

    /// Build a server error from a status code and diagnostic body.
    pub fn server(operation: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Server {
            operation,
            status,
            body: body.into(),
        }
    }

    /// HTTP status carried by server errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience alias for rules protocol results.
pub type RulesResult<T> = Result<T, RulesError>;
