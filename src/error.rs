//! Error types for the mailbox cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised by cache backends.
///
/// These never leave [`crate::cache::CacheStore`]; the store logs them and
/// degrades to a miss or a no-op.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Generic backend failure
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External store failure
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Invalidation pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// == Pool Error Enum ==
/// Errors raised by [`crate::perf::ConnectionPool::acquire`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No idle handle and the pool is at capacity
    #[error("Connection pool exhausted (max size {max_size})")]
    Exhausted { max_size: usize },

    /// The pool was torn down
    #[error("Connection pool has been destroyed")]
    Destroyed,

    /// Opening a new connection failed
    #[error("Failed to open connection: {0}")]
    Connect(String),
}

// == Mailbox Error Enum ==
/// Errors surfaced by the mailbox collaborator.
///
/// `Clone` so that deduplicated callers can all receive the same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    /// Folder or message does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session could not be established or was dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Arguments rejected before reaching the server
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server refused or failed the command
    #[error("Operation failed: {0}")]
    Operation(String),
}

impl MailboxError {
    /// Returns true for failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, MailboxError::Connection(_))
    }
}

/// A session that cannot be checked out is a connection failure, and so
/// retryable.
impl From<PoolError> for MailboxError {
    fn from(e: PoolError) -> Self {
        MailboxError::Connection(e.to_string())
    }
}

// == API Error Enum ==
/// Error type returned by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Failure from the mailbox collaborator
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Mailbox(MailboxError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Mailbox(MailboxError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Mailbox(MailboxError::Auth(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Mailbox(MailboxError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Mailbox(MailboxError::Operation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the HTTP layer.
pub type Result<T> = std::result::Result<T, ApiError>;
