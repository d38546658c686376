//! Core types and collaborator contracts for the wisp light client.
//!
//! A wisp node holds no local chain state. Everything the read/execute path
//! needs (headers, blocks, receipts, account and storage values) is either
//! tracked by a header-only chain store or fetched on demand from full nodes
//! and verified against a state root. This crate defines the shared
//! vocabulary for that:
//!
//! - chain data types ([`Header`], [`Block`], [`Transaction`], [`Receipt`],
//!   [`Account`]) and the call message ([`CallMessage`]),
//! - symbolic block references ([`BlockRef`]) resolved by the backend,
//! - the cancellation context threaded through every network-bound call
//!   ([`FetchCtx`]),
//! - the retrieval failure taxonomy ([`RetrievalError`]),
//! - the [`ChainStore`] collaborator contract.

pub mod block_ref;
pub mod ctx;
pub mod error;
pub mod mock;
pub mod store;
pub mod types;

pub use block_ref::BlockRef;
pub use ctx::FetchCtx;
pub use error::{RetrievalError, RetrievalResult};
pub use store::ChainStore;
pub use types::{Account, Block, CallMessage, ChainSpec, Header, Log, Receipt, Transaction};
