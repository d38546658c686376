//! Chain data types shared across the light client.
//!
//! These are deliberately narrow: only the fields the read/execute path
//! consumes. The chain store owns header identity (`hash`); this crate never
//! recomputes it.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Length of the fixed-width [`Account`] encoding used as a proof leaf
/// payload: nonce (8) + balance (32) + storage root (32) + code hash (32).
pub const ACCOUNT_ENCODED_LEN: usize = 104;

/// Block header as tracked by the chain store.
///
/// Identity is `hash`; two headers with equal hashes are the same header.
/// The struct is cheap to clone (`Bytes` is reference counted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Block number/height.
    pub number: u64,
    /// Block hash (identity).
    pub hash: B256,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Root of the state every proof-backed read is pinned to.
    pub state_root: B256,
    /// Receipts root.
    pub receipts_root: B256,
    /// Block timestamp (Unix seconds).
    pub timestamp: u64,
    /// Gas limit for this block.
    pub gas_limit: u64,
    /// Extra data (chain-specific).
    pub extra_data: Bytes,
}

/// Full block: header plus transaction bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hash of the block (the header's identity).
    pub fn hash(&self) -> B256 {
        self.header.hash
    }
}

/// Signed transaction as seen by the pool and block bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash (identity).
    pub hash: B256,
    /// Recovered sender address.
    pub from: Address,
    /// Recipient (`None` for contract creation).
    pub to: Option<Address>,
    /// Sender nonce.
    pub nonce: u64,
    /// Value transferred.
    pub value: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas price.
    pub gas_price: U256,
    /// Call data.
    pub input: Bytes,
}

/// Execution receipt for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the transaction this receipt belongs to.
    pub transaction_hash: B256,
    /// Gas used by this transaction.
    pub gas_used: u64,
    /// Status (1 = success, 0 = failure).
    pub status: u8,
    /// Logs emitted by this transaction.
    pub logs: Vec<Log>,
}

/// Log/event emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Address that emitted the log.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<B256>,
    /// Log payload.
    pub data: Bytes,
}

/// Account record as proven under a state root.
///
/// The fixed-width encoding ([`Account::to_bytes`]) is what proof leaves
/// carry; decoding is checked so a malformed payload surfaces as an invalid
/// proof rather than a garbage account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Transaction count.
    pub nonce: u64,
    /// Balance in the chain's base unit.
    pub balance: U256,
    /// Root of this account's storage tree.
    pub storage_root: B256,
    /// Hash of the account's code.
    pub code_hash: B256,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: B256::ZERO,
            code_hash: B256::ZERO,
        }
    }
}

impl Account {
    /// Fixed-width encoding: `nonce ‖ balance ‖ storage_root ‖ code_hash`,
    /// all big-endian.
    pub fn to_bytes(&self) -> [u8; ACCOUNT_ENCODED_LEN] {
        let mut out = [0u8; ACCOUNT_ENCODED_LEN];
        out[..8].copy_from_slice(&self.nonce.to_be_bytes());
        out[8..40].copy_from_slice(&self.balance.to_be_bytes::<32>());
        out[40..72].copy_from_slice(self.storage_root.as_slice());
        out[72..104].copy_from_slice(self.code_hash.as_slice());
        out
    }

    /// Checked decode of the fixed-width encoding.
    ///
    /// Returns `None` on any length mismatch; callers treat that as a
    /// malformed proof payload.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ACCOUNT_ENCODED_LEN {
            return None;
        }
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&bytes[..8]);
        Some(Self {
            nonce: u64::from_be_bytes(nonce),
            balance: U256::from_be_slice(&bytes[8..40]),
            storage_root: B256::from_slice(&bytes[40..72]),
            code_hash: B256::from_slice(&bytes[72..104]),
        })
    }
}

/// Message simulated against a call environment.
///
/// Never enters the pool; it describes one hypothetical call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMessage {
    /// Sender address. The builder funds this account with the simulation
    /// sentinel balance inside the private clone.
    pub from: Address,
    /// Recipient (`None` for contract creation).
    pub to: Option<Address>,
    /// Value transferred.
    pub value: U256,
    /// Gas limit for the simulation.
    pub gas_limit: u64,
    /// Gas price used for affordability accounting.
    pub gas_price: U256,
    /// Call data.
    pub input: Bytes,
}

/// Protocol/chain parameters a call environment executes under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Unique chain identifier.
    pub chain_id: u64,
    /// Human-readable network name.
    pub network_name: String,
}

impl ChainSpec {
    pub fn new(chain_id: u64, network_name: impl Into<String>) -> Self {
        Self {
            chain_id,
            network_name: network_name.into(),
        }
    }
}
