//! Backend facade for the wisp light client.
//!
//! This crate is the single entry point RPC handlers talk to. It composes
//! the three core behaviors of the read/execute path:
//!
//! 1. resolve a symbolic block reference to a concrete header
//!    ([`HeadResolver`]),
//! 2. materialize a proof-backed state view pinned to that header
//!    (`wisp_state::StateView`),
//! 3. build an isolated, pre-funded call environment for one simulated
//!    message ([`env::build_call_environment`]),
//!
//! and forwards everything else (pool, oracle, chain data, handles) to
//! collaborators unchanged.

pub mod compiler;
pub mod env;
pub mod error;
pub mod events;
pub mod facade;
pub mod mock;
pub mod resolver;
pub mod traits;

pub use compiler::{CompilerCache, CompilerError, SourceCompiler};
pub use env::{
    build_call_environment, CallEnvironment, ExecutionFault, FaultSlot, MAX_SIMULATION_BALANCE,
};
pub use error::{BackendError, BackendResult, PoolError, PoolResult};
pub use events::{ChainEvent, EventMux};
pub use facade::{BackendConfig, LightBackend};
pub use resolver::HeadResolver;
pub use traits::{AccountManager, Downloader, GasPriceOracle, SyncProgress, TxPool};
