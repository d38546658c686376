//! Reusable mock chain store for tests.

use alloy_primitives::{Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;

use crate::ctx::FetchCtx;
use crate::error::{RetrievalError, RetrievalResult};
use crate::store::ChainStore;
use crate::types::{Block, Header, Receipt};

/// Deterministic header for tests: hash and roots derived from the number.
pub fn test_header(number: u64) -> Header {
    Header {
        number,
        hash: B256::repeat_byte(number as u8),
        parent_hash: B256::repeat_byte(number.saturating_sub(1) as u8),
        state_root: B256::with_last_byte(number as u8),
        receipts_root: B256::ZERO,
        timestamp: 1_700_000_000 + number,
        gas_limit: 30_000_000,
        extra_data: Bytes::new(),
    }
}

/// In-memory chain store with programmable contents and failure injection.
///
/// Headers are indexed by number; the head is the highest inserted number
/// unless rewound with `set_head`. One-shot failures for the network-backed
/// lookups are armed per call site and consumed on the next call.
#[derive(Default)]
pub struct MockChainStore {
    headers: RwLock<BTreeMap<u64, Header>>,
    head: RwLock<u64>,
    blocks: RwLock<BTreeMap<B256, Block>>,
    receipts: RwLock<BTreeMap<B256, Vec<Receipt>>>,
    difficulties: RwLock<BTreeMap<B256, U256>>,
    fail_block_by_hash: Mutex<Option<RetrievalError>>,
    fail_receipts_by_hash: Mutex<Option<RetrievalError>>,
}

impl MockChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with headers 0..=head, head at `head`.
    pub fn with_height(head: u64) -> Self {
        let store = Self::default();
        for number in 0..=head {
            store.insert_header(test_header(number));
        }
        store
    }

    /// Insert a header and advance the head if it extends the chain.
    pub fn insert_header(&self, header: Header) {
        let number = header.number;
        self.headers.write().insert(number, header);
        let mut head = self.head.write();
        if number > *head {
            *head = number;
        }
    }

    pub fn insert_block(&self, block: Block) {
        self.blocks.write().insert(block.hash(), block);
    }

    pub fn insert_receipts(&self, hash: B256, receipts: Vec<Receipt>) {
        self.receipts.write().insert(hash, receipts);
    }

    pub fn insert_difficulty(&self, hash: B256, td: U256) {
        self.difficulties.write().insert(hash, td);
    }

    /// Arm a one-shot failure for the next `block_by_hash` call.
    pub fn fail_next_block_by_hash(&self, err: RetrievalError) {
        *self.fail_block_by_hash.lock() = Some(err);
    }

    /// Arm a one-shot failure for the next `receipts_by_hash` call.
    pub fn fail_next_receipts_by_hash(&self, err: RetrievalError) {
        *self.fail_receipts_by_hash.lock() = Some(err);
    }
}

#[async_trait]
impl ChainStore for MockChainStore {
    fn current_header(&self) -> Header {
        let head = *self.head.read();
        self.headers
            .read()
            .get(&head)
            .cloned()
            .unwrap_or_else(|| test_header(0))
    }

    fn header_by_number(&self, number: u64) -> Option<Header> {
        if number > *self.head.read() {
            return None;
        }
        self.headers.read().get(&number).cloned()
    }

    fn total_difficulty(&self, hash: B256) -> Option<U256> {
        self.difficulties.read().get(&hash).copied()
    }

    fn set_head(&self, number: u64) {
        *self.head.write() = number;
    }

    async fn block_by_hash(&self, ctx: &FetchCtx, hash: B256) -> RetrievalResult<Option<Block>> {
        if let Some(err) = self.fail_block_by_hash.lock().take() {
            return Err(err);
        }
        ctx.run(async { Ok(self.blocks.read().get(&hash).cloned()) })
            .await
    }

    async fn receipts_by_hash(
        &self,
        ctx: &FetchCtx,
        hash: B256,
    ) -> RetrievalResult<Option<Vec<Receipt>>> {
        if let Some(err) = self.fail_receipts_by_hash.lock().take() {
            return Err(err);
        }
        ctx.run(async { Ok(self.receipts.read().get(&hash).cloned()) })
            .await
    }
}
