//! The kinded error taxonomy shared by the dispatcher and its transports.
//!
//! Every error carries a stable numeric status and a symbolic code. Handlers
//! may mint their own kinds through [`DispatchError::custom`]; anything that
//! is not a taxonomy error is coerced to `SERVER_ERROR` at the dispatch
//! boundary.

use thiserror::Error;

/// Errors raised by registration, routing, and handler execution.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No route matched the request path.
    #[error("Not Found")]
    NotFound,

    /// The request payload was malformed. Reserved for handler use and for
    /// the transport edge (unsupported protocol version, bad body).
    #[error("{0}")]
    BadRequest(String),

    /// A registration-time programmer error: the pattern or handler was the
    /// wrong shape. Never surfaces at request time.
    #[error("invalid registration: {0}")]
    InvalidArgument(String),

    /// Catch-all for unclassified handler failure.
    #[error("{0}")]
    Server(String),

    /// A handler-defined taxonomy error with its own status and code.
    #[error("{message}")]
    Custom {
        /// HTTP-style numeric status.
        status: u16,
        /// Symbolic code, e.g. `RATE_LIMITED`.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl DispatchError {
    /// Creates a `BadRequest` error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Creates a registration-time `InvalidArgument` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a `Server` error from any displayable failure.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// Creates a handler-defined taxonomy error.
    pub fn custom(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Custom {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// The HTTP-style numeric status for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::BadRequest(_) => 400,
            Self::InvalidArgument(_) | Self::Server(_) => 500,
            Self::Custom { status, .. } => *status,
        }
    }

    /// The stable symbolic code for this error.
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Server(_) => "SERVER_ERROR",
            Self::Custom { code, .. } => code,
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
