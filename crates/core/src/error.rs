//! Retrieval failure taxonomy for on-demand fetches.

use thiserror::Error;

/// Failure of an on-demand, proof-backed retrieval.
///
/// Provable absence is *not* an error: reads return `Ok(None)` for a key a
/// proof shows missing. This enum covers the cases where the value could not
/// be determined at all. The core never retries these internally; retry
/// policy belongs to the transport.
///
/// `Clone` because a coalesced fetch broadcasts one outcome to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// The caller's context was cancelled while the fetch was outstanding.
    #[error("retrieval cancelled")]
    Cancelled,

    /// The fetch did not complete within its deadline.
    #[error("retrieval timed out")]
    Timeout,

    /// A peer returned a proof that does not verify against the pinned root.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The transport failed to produce a response.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Result type for on-demand retrieval operations.
pub type RetrievalResult<T> = Result<T, RetrievalError>;
