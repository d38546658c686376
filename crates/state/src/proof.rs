//! Authenticated key-value proofs over a sparse binary Merkle tree.
//!
//! Keys are mapped to a 256-bit path via `keccak256(key)`, MSB first; empty
//! subtrees collapse to precomputed default hashes, so proofs always carry
//! exactly [`PROOF_DEPTH`] siblings. A present key hashes its leaf as
//! `keccak(key ‖ 0x01 ‖ value)`; an absent key folds from the empty-leaf
//! default at its unique position, which makes absence provable: a peer
//! cannot answer "not found" without committing to an empty leaf under the
//! root.
//!
//! Storage follows the two-level shape of EIP-1186 responses: the account is
//! proven under the state root, the slot under that account's storage root.
//!
//! [`ProofTree`] is the reference construction (the same tree a serving
//! peer maintains), used by tests and the mock transport.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use alloy_primitives::{keccak256, Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use wisp_core::error::{RetrievalError, RetrievalResult};
use wisp_core::types::Account;

/// Tree depth; every proof carries exactly this many siblings.
pub const PROOF_DEPTH: usize = 256;

/// Hash of an empty subtree of height zero (an absent leaf).
pub const EMPTY_LEAF: B256 = B256::ZERO;

/// Proof that a key maps to `value` (or to nothing) under some root.
///
/// Siblings are ordered leaf to root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateProof {
    /// The proven value; `None` proves absence.
    pub value: Option<Bytes>,
    /// Sibling hashes from the leaf up to the root.
    pub siblings: Vec<B256>,
}

/// Proof for one storage slot: the account under the state root, then the
/// slot under the account's storage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    /// Account record proven under the state root.
    pub account: StateProof,
    /// Slot proven under the account's storage root. Ignored when the
    /// account itself is proven absent.
    pub slot: StateProof,
}

/// Default hashes for empty subtrees, by height.
fn default_hashes() -> &'static [B256; PROOF_DEPTH + 1] {
    static DEFAULTS: OnceLock<[B256; PROOF_DEPTH + 1]> = OnceLock::new();
    DEFAULTS.get_or_init(|| {
        let mut table = [B256::ZERO; PROOF_DEPTH + 1];
        table[0] = EMPTY_LEAF;
        for height in 1..=PROOF_DEPTH {
            table[height] = hash_pair(table[height - 1], table[height - 1]);
        }
        table
    })
}

fn hash_pair(left: B256, right: B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

/// Leaf hash for a present key: commits to both the key and its value.
fn leaf_hash(key: &[u8], value: &[u8]) -> B256 {
    let mut buf = Vec::with_capacity(key.len() + 1 + value.len());
    buf.extend_from_slice(key);
    buf.push(0x01);
    buf.extend_from_slice(value);
    keccak256(buf)
}

/// Bit of `path` at `depth`, where depth 0 is the decision taken at the
/// root. `false` = left child.
fn path_bit(path: &B256, depth: usize) -> bool {
    let byte = path.as_slice()[depth / 8];
    byte & (0x80 >> (depth % 8)) != 0
}

/// Recompute the root a proof commits to for `key`.
///
/// An absence claim folds from the empty-leaf default at the key's position.
fn fold_proof(key: &[u8], proof: &StateProof) -> B256 {
    let path = keccak256(key);
    let mut node = match proof.value.as_deref() {
        Some(value) => leaf_hash(key, value),
        None => EMPTY_LEAF,
    };
    for (level, sibling) in proof.siblings.iter().enumerate() {
        // The first sibling joins at the deepest decision bit.
        let depth = PROOF_DEPTH - 1 - level;
        node = if path_bit(&path, depth) {
            hash_pair(*sibling, node)
        } else {
            hash_pair(node, *sibling)
        };
    }
    node
}

/// Verify a raw key-value proof against `root`.
///
/// `Ok(None)` is a verified absence; any structural or root mismatch is
/// [`RetrievalError::InvalidProof`].
pub fn verify_proof(root: B256, key: &[u8], proof: &StateProof) -> RetrievalResult<Option<Bytes>> {
    if proof.siblings.len() != PROOF_DEPTH {
        return Err(RetrievalError::InvalidProof(format!(
            "expected {PROOF_DEPTH} siblings, got {}",
            proof.siblings.len()
        )));
    }
    let computed = fold_proof(key, proof);
    if computed != root {
        return Err(RetrievalError::InvalidProof(format!(
            "root mismatch: computed {computed}, pinned {root}"
        )));
    }
    Ok(proof.value.clone())
}

/// Verify an account proof against a state root and decode the record.
pub fn verify_account_proof(
    root: B256,
    address: Address,
    proof: &StateProof,
) -> RetrievalResult<Option<Account>> {
    match verify_proof(root, address.as_slice(), proof)? {
        Some(payload) => Account::from_bytes(&payload)
            .map(Some)
            .ok_or_else(|| RetrievalError::InvalidProof("malformed account payload".to_string())),
        None => Ok(None),
    }
}

/// Verify a storage proof chain against a state root.
///
/// A provably absent account proves every one of its slots absent, so the
/// slot half is not consulted in that case.
pub fn verify_storage_proof(
    root: B256,
    address: Address,
    slot: B256,
    proof: &StorageProof,
) -> RetrievalResult<Option<Bytes>> {
    let Some(account) = verify_account_proof(root, address, &proof.account)? else {
        return Ok(None);
    };
    verify_proof(account.storage_root, slot.as_slice(), &proof.slot)
}

/// Reference in-memory sparse Merkle tree.
///
/// This is what a serving peer maintains per root: it can produce the root
/// commitment and a [`StateProof`] for any key, present or absent.
#[derive(Debug, Clone, Default)]
pub struct ProofTree {
    /// Leaves keyed by path; each holds the original key and its value.
    leaves: BTreeMap<B256, (Vec<u8>, Bytes)>,
}

impl ProofTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for a key.
    pub fn insert(&mut self, key: impl AsRef<[u8]>, value: impl Into<Bytes>) {
        let key = key.as_ref().to_vec();
        let path = keccak256(&key);
        self.leaves.insert(path, (key, value.into()));
    }

    /// Remove a key; subsequent proofs for it prove absence.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) {
        self.leaves.remove(&keccak256(key.as_ref()));
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Root commitment over all leaves.
    pub fn root(&self) -> B256 {
        let entries: Vec<(B256, B256)> = self
            .leaves
            .iter()
            .map(|(path, (key, value))| (*path, leaf_hash(key, value)))
            .collect();
        Self::node_hash(0, &entries)
    }

    /// Produce a proof for `key`, present or absent.
    pub fn prove(&self, key: &[u8]) -> StateProof {
        let path = keccak256(key);
        let entries: Vec<(B256, B256)> = self
            .leaves
            .iter()
            .map(|(p, (k, v))| (*p, leaf_hash(k, v)))
            .collect();

        let mut siblings = Vec::with_capacity(PROOF_DEPTH);
        let mut span: &[(B256, B256)] = &entries;
        for depth in 0..PROOF_DEPTH {
            let split = span.partition_point(|(p, _)| !path_bit(p, depth));
            let (left, right) = span.split_at(split);
            let (taken, other) = if path_bit(&path, depth) {
                (right, left)
            } else {
                (left, right)
            };
            siblings.push(Self::node_hash(depth + 1, other));
            span = taken;
        }
        // Descent order is root→leaf; proofs carry leaf→root.
        siblings.reverse();

        let value = self.leaves.get(&path).map(|(_, value)| value.clone());
        StateProof { value, siblings }
    }

    /// Hash of the subtree rooted at `depth` covering `entries` (sorted by
    /// path, all sharing the same path prefix above `depth`).
    fn node_hash(depth: usize, entries: &[(B256, B256)]) -> B256 {
        if entries.is_empty() {
            return default_hashes()[PROOF_DEPTH - depth];
        }
        if depth == PROOF_DEPTH {
            return entries[0].1;
        }
        let split = entries.partition_point(|(path, _)| !path_bit(path, depth));
        let (left, right) = entries.split_at(split);
        hash_pair(
            Self::node_hash(depth + 1, left),
            Self::node_hash(depth + 1, right),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn sample_account(nonce: u64) -> Account {
        Account {
            nonce,
            balance: U256::from(10u64),
            storage_root: B256::repeat_byte(0x11),
            code_hash: B256::repeat_byte(0x22),
        }
    }

    #[test]
    fn empty_tree_proves_absence() {
        let tree = ProofTree::new();
        let root = tree.root();
        assert_eq!(root, default_hashes()[PROOF_DEPTH]);

        let proof = tree.prove(b"missing");
        let value = verify_proof(root, b"missing", &proof).expect("absence proof should verify");
        assert!(value.is_none());
    }

    #[test]
    fn present_key_round_trips() {
        let mut tree = ProofTree::new();
        tree.insert(b"alpha", Bytes::from_static(b"one"));
        tree.insert(b"beta", Bytes::from_static(b"two"));
        let root = tree.root();

        let proof = tree.prove(b"alpha");
        let value = verify_proof(root, b"alpha", &proof).expect("proof should verify");
        assert_eq!(value, Some(Bytes::from_static(b"one")));
    }

    #[test]
    fn absence_among_present_keys_verifies() {
        let mut tree = ProofTree::new();
        for i in 0u8..16 {
            tree.insert([i], Bytes::from(vec![i]));
        }
        let root = tree.root();

        let proof = tree.prove(b"nowhere");
        let value = verify_proof(root, b"nowhere", &proof).expect("absence should verify");
        assert!(value.is_none());
    }

    #[test]
    fn tampered_value_is_rejected() {
        let mut tree = ProofTree::new();
        tree.insert(b"key", Bytes::from_static(b"honest"));
        let root = tree.root();

        let mut proof = tree.prove(b"key");
        proof.value = Some(Bytes::from_static(b"forged"));

        let err = verify_proof(root, b"key", &proof).expect_err("forged value must fail");
        assert!(matches!(err, RetrievalError::InvalidProof(_)));
    }

    #[test]
    fn tampered_sibling_is_rejected() {
        let mut tree = ProofTree::new();
        tree.insert(b"key", Bytes::from_static(b"value"));
        let root = tree.root();

        let mut proof = tree.prove(b"key");
        proof.siblings[0] = B256::repeat_byte(0xFF);

        let err = verify_proof(root, b"key", &proof).expect_err("corrupt sibling must fail");
        assert!(matches!(err, RetrievalError::InvalidProof(_)));
    }

    #[test]
    fn truncated_proof_is_rejected() {
        let mut tree = ProofTree::new();
        tree.insert(b"key", Bytes::from_static(b"value"));
        let root = tree.root();

        let mut proof = tree.prove(b"key");
        proof.siblings.pop();

        let err = verify_proof(root, b"key", &proof).expect_err("short proof must fail");
        assert!(matches!(err, RetrievalError::InvalidProof(_)));
    }

    #[test]
    fn claimed_absence_of_present_key_is_rejected() {
        let mut tree = ProofTree::new();
        tree.insert(b"key", Bytes::from_static(b"value"));
        let root = tree.root();

        let mut proof = tree.prove(b"key");
        proof.value = None;

        let err = verify_proof(root, b"key", &proof).expect_err("false absence must fail");
        assert!(matches!(err, RetrievalError::InvalidProof(_)));
    }

    #[test]
    fn account_proof_decodes_record() {
        let address = Address::repeat_byte(0xAA);
        let account = sample_account(9);

        let mut tree = ProofTree::new();
        tree.insert(address.as_slice(), Bytes::from(account.to_bytes().to_vec()));
        let root = tree.root();

        let proof = tree.prove(address.as_slice());
        let decoded =
            verify_account_proof(root, address, &proof).expect("account proof should verify");
        assert_eq!(decoded, Some(account));
    }

    #[test]
    fn malformed_account_payload_is_invalid_proof() {
        let address = Address::repeat_byte(0xAB);

        let mut tree = ProofTree::new();
        tree.insert(address.as_slice(), Bytes::from_static(b"not an account"));
        let root = tree.root();

        let proof = tree.prove(address.as_slice());
        let err = verify_account_proof(root, address, &proof)
            .expect_err("undecodable payload must fail");
        assert!(matches!(err, RetrievalError::InvalidProof(_)));
    }

    #[test]
    fn storage_proof_chains_through_account() {
        let address = Address::repeat_byte(0xCC);
        let slot = B256::with_last_byte(1);

        let mut storage = ProofTree::new();
        storage.insert(slot.as_slice(), Bytes::from_static(b"stored"));

        let account = Account {
            storage_root: storage.root(),
            ..sample_account(1)
        };
        let mut state = ProofTree::new();
        state.insert(address.as_slice(), Bytes::from(account.to_bytes().to_vec()));
        let root = state.root();

        let proof = StorageProof {
            account: state.prove(address.as_slice()),
            slot: storage.prove(slot.as_slice()),
        };
        let value =
            verify_storage_proof(root, address, slot, &proof).expect("chain should verify");
        assert_eq!(value, Some(Bytes::from_static(b"stored")));
    }

    #[test]
    fn absent_account_proves_slot_absent() {
        let address = Address::repeat_byte(0xCD);
        let slot = B256::with_last_byte(2);

        let state = ProofTree::new();
        let root = state.root();

        let proof = StorageProof {
            account: state.prove(address.as_slice()),
            slot: ProofTree::new().prove(slot.as_slice()),
        };
        let value =
            verify_storage_proof(root, address, slot, &proof).expect("absence should verify");
        assert!(value.is_none());
    }

    #[test]
    fn remove_restores_absence() {
        let mut tree = ProofTree::new();
        tree.insert(b"key", Bytes::from_static(b"value"));
        tree.remove(b"key");
        let root = tree.root();

        assert!(tree.is_empty());
        let proof = tree.prove(b"key");
        let value = verify_proof(root, b"key", &proof).expect("absence should verify");
        assert!(value.is_none());
    }
}
