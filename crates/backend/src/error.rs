//! Backend error types.

use thiserror::Error;

use wisp_core::block_ref::BlockRef;
use wisp_core::error::RetrievalError;

/// Transaction pool failure, as forwarded by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool declined the transaction. The reason is opaque to the
    /// backend and forwarded verbatim.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// A network-bound pool operation failed to retrieve state.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

/// Result type for pool pass-through operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Failure of a backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// An on-demand fetch underneath the operation failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// A block reference could not be resolved where a header is required.
    #[error("block reference cannot be resolved: {0}")]
    InvalidReference(BlockRef),

    /// The transaction pool declined a submission.
    #[error("transaction rejected by pool: {0}")]
    PoolRejected(String),
}

impl From<PoolError> for BackendError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Rejected(reason) => BackendError::PoolRejected(reason),
            PoolError::Retrieval(err) => BackendError::Retrieval(err),
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
