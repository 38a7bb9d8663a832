//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while opening or using the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred in a backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No usable persistent backend could be provided.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Why the backend could not be opened.
        reason: String,
    },

    /// An operation inside the transaction failed; none of its writes apply.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for the abort.
        reason: String,
    },

    /// The store handle has been closed.
    #[error("store is closed")]
    Closed,

    /// The commit log is corrupted beyond a recoverable torn tail.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl StoreError {
    /// Creates an unavailable-backend error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
