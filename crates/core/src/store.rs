//! Chain store collaborator contract.

use alloy_primitives::{B256, U256};
use async_trait::async_trait;

use crate::ctx::FetchCtx;
use crate::error::RetrievalResult;
use crate::types::{Block, Header, Receipt};

/// Header-oriented chain store the backend reads from.
///
/// Header tracking (`current_header`, `header_by_number`, `set_head`,
/// `total_difficulty`) is purely local and infallible apart from absence.
/// Block bodies and receipts are not held locally on a light client, so
/// those lookups take a [`FetchCtx`] and may fail with a retrieval error.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// The current committed head header.
    fn current_header(&self) -> Header;

    /// Header at the given height, or `None` beyond the known chain.
    fn header_by_number(&self, number: u64) -> Option<Header>;

    /// Total chain weight at the given block, or `None` for an unknown hash.
    fn total_difficulty(&self, hash: B256) -> Option<U256>;

    /// Rewind the head to the given height.
    fn set_head(&self, number: u64);

    /// Block body for a hash, fetched on demand.
    async fn block_by_hash(&self, ctx: &FetchCtx, hash: B256) -> RetrievalResult<Option<Block>>;

    /// Receipts for a block hash, fetched on demand.
    async fn receipts_by_hash(
        &self,
        ctx: &FetchCtx,
        hash: B256,
    ) -> RetrievalResult<Option<Vec<Receipt>>>;
}
