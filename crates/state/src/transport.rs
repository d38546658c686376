//! On-demand retrieval transport contract.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use wisp_core::ctx::FetchCtx;
use wisp_core::error::RetrievalResult;

use crate::proof::{StateProof, StorageProof};

/// Fetches account and storage proofs from remote peers.
///
/// The transport owns peer selection, request framing, and any retry policy.
/// Returned proofs are *not* trusted: the state view verifies them against
/// the pinned root before anything is cached. The context bounds the fetch;
/// implementations should give up promptly once it fires.
#[async_trait]
pub trait ProofTransport: Send + Sync {
    /// Proof for the account at `address` under state root `root`.
    async fn account_proof(
        &self,
        ctx: &FetchCtx,
        root: B256,
        address: Address,
    ) -> RetrievalResult<StateProof>;

    /// Proof chain for `slot` of `address` under state root `root`.
    async fn storage_proof(
        &self,
        ctx: &FetchCtx,
        root: B256,
        address: Address,
        slot: B256,
    ) -> RetrievalResult<StorageProof>;
}
