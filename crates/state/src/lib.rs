//! Proof-backed state views for the wisp light client.
//!
//! A [`StateView`] behaves like a complete account/storage database pinned to
//! one header, while actually holding nothing: every cache miss turns into an
//! on-demand, cancellable network fetch of a Merkle proof rooted at the
//! header's state root, verified locally before anything is returned or
//! cached.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            StateView (per request)           │
//! │   overlay: private writes (copy-on-write)    │
//! └──────────────────────┬───────────────────────┘
//!                        │ miss
//!          ┌─────────────▼─────────────┐
//!          │         StateCache        │
//!          │  verified facts + merged  │
//!          │     in-flight fetches     │
//!          └─────────────┬─────────────┘
//!                        │ miss (one fetch per key)
//!          ┌─────────────▼─────────────┐
//!          │       ProofTransport      │
//!          │   (remote peers, proofs)  │
//!          └───────────────────────────┘
//! ```
//!
//! Clones of a view share the verified-fact cache (root-pinned data never
//! changes) but keep writes in a private overlay, so concurrent simulations
//! against the same header cannot observe each other.

pub mod cache;
pub mod metrics;
pub mod mock;
pub mod proof;
pub mod transport;
pub mod view;

pub use cache::StateCache;
pub use metrics::{OptionalMetrics, StateMetrics};
pub use proof::{
    verify_account_proof, verify_proof, verify_storage_proof, ProofTree, StateProof, StorageProof,
};
pub use transport::ProofTransport;
pub use view::{StateView, ViewConfig};
