//! # Operation Errors
//!
//! Error taxonomy shared by the compiler, the handlers and the executor.
//!
//! - `InvalidArgument` and `UnsupportedOperation` are raised before any
//!   store interaction for the offending operation.
//! - `ExecutionFailure` wraps a store error and keeps it as the source.
//! - `ValidationFailure` is produced by external validators and passed
//!   through unchanged.

use serde_json::Value;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for operation compilation and execution
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced by the operation compiler and executor
#[derive(Debug, Error)]
pub enum QueryError {
    /// Missing required field, malformed join, unknown operator or join kind
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unrecognized operation kind
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The store failed while executing a compiled query
    #[error("Execution failed: {message}")]
    ExecutionFailure {
        message: String,
        #[source]
        source: StoreError,
    },

    /// Raised by a validator collaborator
    #[error("Validation failed: {message}")]
    ValidationFailure { message: String, errors: Value },
}

impl QueryError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported_operation(kind: impl Into<String>) -> Self {
        Self::UnsupportedOperation(kind.into())
    }

    /// Wrap a store error with context
    pub fn execution(msg: impl Into<String>, source: StoreError) -> Self {
        Self::ExecutionFailure {
            message: msg.into(),
            source,
        }
    }

    /// Create a validation failure carrying the per-field errors
    pub fn validation(msg: impl Into<String>, errors: Value) -> Self {
        Self::ValidationFailure {
            message: msg.into(),
            errors,
        }
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Self::ExecutionFailure { .. } => "EXECUTION_FAILURE",
            Self::ValidationFailure { .. } => "VALIDATION_FAILURE",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 400,
            Self::UnsupportedOperation(_) => 400,
            Self::ExecutionFailure { .. } => 500,
            Self::ValidationFailure { .. } => 422,
        }
    }

    /// Returns true if the error was raised before touching the store
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}
