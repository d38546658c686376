//! Reusable mock collaborators for backend tests.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use wisp_core::ctx::FetchCtx;
use wisp_core::error::{RetrievalError, RetrievalResult};
use wisp_core::types::Transaction;

use crate::error::{PoolError, PoolResult};
use crate::traits::{AccountManager, Downloader, GasPriceOracle, SyncProgress, TxPool};

/// In-memory transaction pool with programmable rejection.
#[derive(Default)]
pub struct MockTxPool {
    transactions: RwLock<BTreeMap<B256, Transaction>>,
    nonces: RwLock<BTreeMap<Address, u64>>,
    reject_next: Mutex<Option<String>>,
    fail_next_nonce: Mutex<Option<RetrievalError>>,
}

impl MockTxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next submission with the given reason.
    pub fn reject_next(&self, reason: impl Into<String>) {
        *self.reject_next.lock() = Some(reason.into());
    }

    /// Fail the next nonce query.
    pub fn fail_next_nonce(&self, err: RetrievalError) {
        *self.fail_next_nonce.lock() = Some(err);
    }

    /// Program the pool-aware nonce for an address.
    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.nonces.write().insert(address, nonce);
    }
}

#[async_trait]
impl TxPool for MockTxPool {
    async fn add(&self, _ctx: &FetchCtx, tx: Transaction) -> PoolResult<()> {
        if let Some(reason) = self.reject_next.lock().take() {
            return Err(PoolError::Rejected(reason));
        }
        self.transactions.write().insert(tx.hash, tx);
        Ok(())
    }

    fn remove(&self, hash: B256) {
        self.transactions.write().remove(&hash);
    }

    fn get(&self, hash: B256) -> Option<Transaction> {
        self.transactions.read().get(&hash).cloned()
    }

    fn all(&self) -> Vec<Transaction> {
        self.transactions.read().values().cloned().collect()
    }

    async fn nonce(&self, _ctx: &FetchCtx, address: Address) -> RetrievalResult<u64> {
        if let Some(err) = self.fail_next_nonce.lock().take() {
            return Err(err);
        }
        Ok(self.nonces.read().get(&address).copied().unwrap_or(0))
    }

    fn pending_count(&self) -> usize {
        self.transactions.read().len()
    }
}

/// Oracle returning a fixed price, with one-shot failure injection.
pub struct StaticOracle {
    price: U256,
    fail_next: Mutex<Option<RetrievalError>>,
}

impl StaticOracle {
    pub fn new(price: U256) -> Self {
        Self {
            price,
            fail_next: Mutex::new(None),
        }
    }

    pub fn fail_next(&self, err: RetrievalError) {
        *self.fail_next.lock() = Some(err);
    }
}

#[async_trait]
impl GasPriceOracle for StaticOracle {
    async fn suggest(&self, _ctx: &FetchCtx) -> RetrievalResult<U256> {
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        Ok(self.price)
    }
}

/// Account manager over a fixed address list.
#[derive(Default)]
pub struct StaticAccountManager {
    addresses: Vec<Address>,
}

impl StaticAccountManager {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }
}

impl AccountManager for StaticAccountManager {
    fn accounts(&self) -> Vec<Address> {
        self.addresses.clone()
    }
}

/// Downloader reporting a fixed sync snapshot.
pub struct StaticDownloader {
    progress: SyncProgress,
}

impl StaticDownloader {
    pub fn new(progress: SyncProgress) -> Self {
        Self { progress }
    }

    pub fn synced_at(block: u64) -> Self {
        Self::new(SyncProgress {
            starting_block: 0,
            current_block: block,
            highest_block: block,
        })
    }
}

impl Downloader for StaticDownloader {
    fn progress(&self) -> SyncProgress {
        self.progress
    }
}
