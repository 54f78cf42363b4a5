//! Error types for store operations

use std::fmt;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the persistent store
#[derive(Debug)]
pub enum StoreError {
    /// Connection to the store failed
    ConnectionFailed(String),

    /// A query failed
    QueryFailed(String),

    /// The requested row does not exist
    NotFound(String),

    /// A caller-supplied value failed validation before reaching the backend
    InvalidInput(String),

    /// Backend-specific error
    BackendError(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to store: {}", msg)
            }
            StoreError::QueryFailed(msg) => write!(f, "store query failed: {}", msg),
            StoreError::NotFound(msg) => write!(f, "not found: {}", msg),
            StoreError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            StoreError::BackendError(msg) => write!(f, "store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}
