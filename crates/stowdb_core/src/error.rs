//! Error types for StowDB core.

use stowdb_store::StoreError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in StowDB core operations.
///
/// A missing document is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No usable persistent backend.
    #[error("store unavailable: {reason}")]
    StoreUnavailable {
        /// Why the backend could not be opened.
        reason: String,
    },

    /// An operation inside the transaction failed; none of its writes apply.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for the abort.
        reason: String,
    },

    /// An update request mixes operators and plain values, or is malformed.
    #[error("invalid mutation: {message}")]
    InvalidMutation {
        /// Description of the problem.
        message: String,
    },

    /// A value that must be a document is not a JSON object.
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// Description of the problem.
        message: String,
    },

    /// A database or collection name cannot form a namespace.
    #[error("invalid namespace {namespace:?}: {message}")]
    InvalidNamespace {
        /// The rejected namespace.
        namespace: String,
        /// Description of the problem.
        message: String,
    },

    /// Any other store error.
    #[error("store error: {0}")]
    Store(StoreError),

    /// A change entry could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid mutation error.
    pub fn invalid_mutation(message: impl Into<String>) -> Self {
        Self::InvalidMutation {
            message: message.into(),
        }
    }

    /// Creates an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates an invalid namespace error.
    pub fn invalid_namespace(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidNamespace {
            namespace: namespace.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { reason } => Self::StoreUnavailable { reason },
            StoreError::TransactionAborted { reason } => Self::TransactionAborted { reason },
            other => Self::Store(other),
        }
    }
}
