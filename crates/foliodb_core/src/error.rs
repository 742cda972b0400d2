//! Error types for FolioDB core.

use foliodb_codec::CodecError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in FolioDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An encoded body could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A body decoded but does not have the shape a document needs.
    #[error("data format error: {message}")]
    DataFormat {
        /// Description of the problem.
        message: String,
    },

    /// Array index beyond the current count.
    #[error("array index {index} is out of range (count {count})")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The array's count at the time of the call.
        count: usize,
    },

    /// Write attempted on a read-only collection.
    #[error("collection is read-only; mutate a copy from to_mutable()")]
    Immutable,

    /// Document not found.
    #[error("document not found: {id}")]
    DocumentNotFound {
        /// The document ID that was not found.
        id: String,
    },

    /// Revision not present in the document's history.
    #[error("revision {rev_id} not found in document {id}")]
    RevisionNotFound {
        /// The document ID.
        id: String,
        /// The missing revision ID.
        rev_id: String,
    },

    /// A write named a parent revision that is no longer a leaf.
    #[error("conflict writing document {id}")]
    Conflict {
        /// The conflicting document.
        id: String,
    },

    /// The conflict resolver declined to pick a winner.
    #[error("conflict in document {id} was not resolved")]
    ConflictUnresolved {
        /// The conflicting document.
        id: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a data format error.
    pub fn data_format(message: impl Into<String>) -> Self {
        Self::DataFormat {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    /// Creates a revision not found error.
    pub fn revision_not_found(id: impl Into<String>, rev_id: impl Into<String>) -> Self {
        Self::RevisionNotFound {
            id: id.into(),
            rev_id: rev_id.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// True for errors caused by a structurally invalid body.
    pub fn is_data_format(&self) -> bool {
        matches!(self, Self::Codec(_) | Self::DataFormat { .. })
    }
}
