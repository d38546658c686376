//! Programmable proof transport for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use wisp_core::ctx::FetchCtx;
use wisp_core::error::{RetrievalError, RetrievalResult};
use wisp_core::types::{Account, Header};

use crate::proof::{ProofTree, StateProof, StorageProof};
use crate::transport::ProofTransport;

#[derive(Default)]
struct WorldAccount {
    nonce: u64,
    balance: U256,
    code_hash: B256,
    storage: ProofTree,
}

impl WorldAccount {
    /// Account record with the storage root derived from the storage tree.
    fn record(&self) -> Account {
        Account {
            nonce: self.nonce,
            balance: self.balance,
            storage_root: self.storage.root(),
            code_hash: self.code_hash,
        }
    }
}

#[derive(Default)]
struct World {
    accounts: BTreeMap<Address, WorldAccount>,
}

impl World {
    fn state_tree(&self) -> ProofTree {
        let mut tree = ProofTree::new();
        for (address, entry) in &self.accounts {
            tree.insert(address.as_slice(), entry.record().to_bytes().to_vec());
        }
        tree
    }
}

/// Transport that serves real, verifiable proofs from an in-memory world.
///
/// Counts calls, and supports injectable latency, one-shot failures, and
/// proof corruption so cancellation, coalescing and verification paths can
/// all be exercised. The storage root of every account is derived from its
/// programmed slots; `storage_root` passed via [`MockTransport::insert_account`]
/// is ignored.
#[derive(Default)]
pub struct MockTransport {
    world: RwLock<World>,
    delay: RwLock<Option<Duration>>,
    corrupt: AtomicBool,
    account_calls: AtomicUsize,
    storage_calls: AtomicUsize,
    fail_account: Mutex<Option<RetrievalError>>,
    fail_storage: Mutex<Option<RetrievalError>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program an account. Existing storage slots are kept.
    pub fn insert_account(&self, address: Address, account: Account) {
        let mut world = self.world.write();
        let entry = world.accounts.entry(address).or_default();
        entry.nonce = account.nonce;
        entry.balance = account.balance;
        entry.code_hash = account.code_hash;
    }

    /// Program a storage slot, creating an empty account if needed.
    pub fn insert_storage(&self, address: Address, slot: B256, value: Bytes) {
        let mut world = self.world.write();
        let entry = world.accounts.entry(address).or_default();
        entry.storage.insert(slot.as_slice(), value);
    }

    /// State root committing to the current world.
    pub fn state_root(&self) -> B256 {
        self.world.read().state_tree().root()
    }

    /// Header at `number` whose state root matches the current world.
    pub fn header(&self, number: u64) -> Header {
        Header {
            state_root: self.state_root(),
            ..wisp_core::mock::test_header(number)
        }
    }

    /// Delay applied to every proof request (cancellable via the context).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = Some(delay);
    }

    /// Serve proofs with a corrupted sibling until turned off again.
    pub fn corrupt_proofs(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::SeqCst);
    }

    /// Arm a one-shot failure for the next account proof request.
    pub fn fail_next_account_proof(&self, err: RetrievalError) {
        *self.fail_account.lock() = Some(err);
    }

    /// Arm a one-shot failure for the next storage proof request.
    pub fn fail_next_storage_proof(&self, err: RetrievalError) {
        *self.fail_storage.lock() = Some(err);
    }

    /// Number of account proof requests served or failed.
    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    /// Number of storage proof requests served or failed.
    pub fn storage_calls(&self) -> usize {
        self.storage_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self, ctx: &FetchCtx) -> RetrievalResult<()> {
        let delay = *self.delay.read();
        match delay {
            Some(delay) => {
                ctx.run(async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await
            }
            None => Ok(()),
        }
    }

    fn maybe_corrupt(&self, mut proof: StateProof) -> StateProof {
        if self.corrupt.load(Ordering::SeqCst) {
            proof.siblings[0].0[0] ^= 0xFF;
        }
        proof
    }
}

#[async_trait]
impl ProofTransport for MockTransport {
    async fn account_proof(
        &self,
        ctx: &FetchCtx,
        _root: B256,
        address: Address,
    ) -> RetrievalResult<StateProof> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(ctx).await?;
        // Failures fire after the latency window so coalescing tests can
        // attach waiters before the outcome lands.
        if let Some(err) = self.fail_account.lock().take() {
            return Err(err);
        }

        let proof = self.world.read().state_tree().prove(address.as_slice());
        Ok(self.maybe_corrupt(proof))
    }

    async fn storage_proof(
        &self,
        ctx: &FetchCtx,
        _root: B256,
        address: Address,
        slot: B256,
    ) -> RetrievalResult<StorageProof> {
        self.storage_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(ctx).await?;
        if let Some(err) = self.fail_storage.lock().take() {
            return Err(err);
        }

        let world = self.world.read();
        let account = world.state_tree().prove(address.as_slice());
        let slot_proof = match world.accounts.get(&address) {
            Some(entry) => entry.storage.prove(slot.as_slice()),
            None => ProofTree::new().prove(slot.as_slice()),
        };
        Ok(StorageProof {
            account: self.maybe_corrupt(account),
            slot: slot_proof,
        })
    }
}
