//! Isolated call environments for side-effect-free simulation.

use std::sync::{Arc, OnceLock};

use alloy_primitives::U256;
use thiserror::Error;
use tracing::debug;

use wisp_core::ctx::FetchCtx;
use wisp_core::error::{RetrievalError, RetrievalResult};
use wisp_core::types::{CallMessage, ChainSpec, Header};
use wisp_state::StateView;

/// Balance stamped onto the simulated sender so value and gas affordability
/// checks never reject a read-only call.
pub const MAX_SIMULATION_BALANCE: U256 = U256::MAX;

/// Fault raised while executing a message inside a call environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFault {
    /// A state read underneath execution failed to retrieve.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// The execution engine itself failed.
    #[error("execution failed: {0}")]
    Execution(String),
}

/// Write-once fault cell, read by the caller after execution completes.
///
/// Only the first recorded fault sticks; later ones are dropped. The slot is
/// a result channel, shared between the environment and the caller's handle.
#[derive(Debug, Clone, Default)]
pub struct FaultSlot(Arc<OnceLock<ExecutionFault>>);

impl FaultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault. Returns `false` if one was already recorded.
    pub fn record(&self, fault: ExecutionFault) -> bool {
        self.0.set(fault).is_ok()
    }

    /// The recorded fault, if any.
    pub fn fault(&self) -> Option<ExecutionFault> {
        self.0.get().cloned()
    }

    /// Whether a fault has been recorded.
    pub fn is_faulted(&self) -> bool {
        self.0.get().is_some()
    }
}

/// Everything one simulated call executes against.
///
/// Single-use: created per call, discarded once the caller has consumed the
/// fault slot. The contained state view is a private clone; nothing the
/// execution engine writes through it can reach shared state.
pub struct CallEnvironment {
    state: StateView,
    message: CallMessage,
    spec: ChainSpec,
    fault: FaultSlot,
}

impl core::fmt::Debug for CallEnvironment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallEnvironment")
            .field("message", &self.message)
            .field("spec", &self.spec)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

impl CallEnvironment {
    /// The execution-private state clone.
    pub fn state(&self) -> &StateView {
        &self.state
    }

    /// Mutable access for the execution engine.
    pub fn state_mut(&mut self) -> &mut StateView {
        &mut self.state
    }

    /// The message being simulated.
    pub fn message(&self) -> &CallMessage {
        &self.message
    }

    /// The header the simulation is pinned to.
    pub fn header(&self) -> &Header {
        self.state.header()
    }

    /// Chain parameters the call executes under.
    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    /// Handle to the fault slot.
    pub fn fault_slot(&self) -> FaultSlot {
        self.fault.clone()
    }

    /// Record a fault raised during execution.
    pub fn record_fault(&self, fault: ExecutionFault) -> bool {
        self.fault.record(fault)
    }
}

/// Build an isolated environment for simulating `message` against the header
/// `view` is pinned to.
///
/// The view is cloned, the sender account is fetched or created inside the
/// clone (the one step that can hit the network), and its balance is
/// overridden with [`MAX_SIMULATION_BALANCE`], visible only inside the
/// clone. Execution itself is the caller's business; this function only
/// guarantees a correctly isolated, funded, root-pinned context.
///
/// Callers must resolve the header first; there is no absent-header case at
/// this level.
pub async fn build_call_environment(
    ctx: &FetchCtx,
    message: CallMessage,
    view: &StateView,
    spec: ChainSpec,
) -> RetrievalResult<(CallEnvironment, FaultSlot)> {
    let mut state = view.clone();

    let mut sender = state.account_or_default(ctx, message.from).await?;
    sender.balance = MAX_SIMULATION_BALANCE;
    state.put_account(message.from, sender);

    debug!(
        sender = %message.from,
        header = %state.header().hash,
        "built call environment"
    );

    let fault = FaultSlot::new();
    let env = CallEnvironment {
        state,
        message,
        spec,
        fault: fault.clone(),
    };
    Ok((env, fault))
}
