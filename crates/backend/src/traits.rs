//! Collaborator contracts consumed by the backend facade.
//!
//! The backend never looks inside these: every operation forwards arguments
//! and propagates the collaborator's result unchanged.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wisp_core::ctx::FetchCtx;
use wisp_core::error::RetrievalResult;
use wisp_core::types::Transaction;

use crate::error::PoolResult;

/// Transaction pool of a light node.
///
/// Admission may consult remote state (sender nonce/balance), so `add` and
/// `nonce` take a context and can fail with a retrieval error.
#[async_trait]
pub trait TxPool: Send + Sync {
    /// Submit a signed transaction.
    async fn add(&self, ctx: &FetchCtx, tx: Transaction) -> PoolResult<()>;

    /// Drop a transaction from the pool, if present.
    fn remove(&self, hash: B256);

    /// Look up a pooled transaction by hash.
    fn get(&self, hash: B256) -> Option<Transaction>;

    /// All currently pooled transactions.
    fn all(&self) -> Vec<Transaction>;

    /// Next nonce for `address`, accounting for pooled transactions.
    async fn nonce(&self, ctx: &FetchCtx, address: Address) -> RetrievalResult<u64>;

    /// Number of pending transactions.
    fn pending_count(&self) -> usize;
}

/// Gas price oracle.
#[async_trait]
pub trait GasPriceOracle: Send + Sync {
    /// Suggested gas price for new transactions.
    async fn suggest(&self, ctx: &FetchCtx) -> RetrievalResult<U256>;
}

/// Account/key management handle exposed through the facade.
pub trait AccountManager: Send + Sync {
    /// Addresses under management.
    fn accounts(&self) -> Vec<Address>;
}

/// Sync engine handle exposed through the facade.
pub trait Downloader: Send + Sync {
    /// Current sync progress.
    fn progress(&self) -> SyncProgress;
}

/// Snapshot of chain synchronization progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Block the sync started from.
    pub starting_block: u64,
    /// Block currently processed.
    pub current_block: u64,
    /// Highest block known from peers.
    pub highest_block: u64,
}
