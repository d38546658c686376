//! End-to-end simulation flow: resolve a reference, build a call
//! environment for a never-funded sender, and verify nothing leaks back
//! into shared state.

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};

use wisp_backend::{
    BackendConfig, ExecutionFault, GasPriceOracle, LightBackend, TxPool, MAX_SIMULATION_BALANCE,
};
use wisp_backend::mock::{MockTxPool, StaticOracle};
use wisp_core::block_ref::BlockRef;
use wisp_core::ctx::FetchCtx;
use wisp_core::error::RetrievalError;
use wisp_core::mock::MockChainStore;
use wisp_core::store::ChainStore;
use wisp_core::types::{Account, CallMessage, ChainSpec};
use wisp_state::mock::MockTransport;
use wisp_state::{ProofTransport, ViewConfig};

fn backend_with_world() -> (Arc<MockChainStore>, Arc<MockTransport>, LightBackend) {
    let store = Arc::new(MockChainStore::with_height(8));
    let transport = Arc::new(MockTransport::new());
    let backend = LightBackend::new(
        Arc::clone(&store) as Arc<dyn ChainStore>,
        Arc::clone(&transport) as Arc<dyn ProofTransport>,
        Arc::new(MockTxPool::new()) as Arc<dyn TxPool>,
        Arc::new(StaticOracle::new(U256::from(1u64))) as Arc<dyn GasPriceOracle>,
        BackendConfig {
            spec: ChainSpec::new(4242, "wisp-e2e"),
            protocol_version: 2,
            compiler_path: PathBuf::from("/nonexistent/wisp-solc"),
            view: ViewConfig::default(),
        },
    );
    (store, transport, backend)
}

fn call_from(sender: Address) -> CallMessage {
    CallMessage {
        from: sender,
        to: Some(Address::repeat_byte(0xEE)),
        value: U256::from(10u64),
        gas_limit: 5_000_000,
        gas_price: U256::from(2u64),
        input: Bytes::from_static(b"\x01\x02"),
    }
}

#[tokio::test]
async fn simulation_for_an_absent_sender_is_hermetic() {
    let (store, transport, backend) = backend_with_world();

    // Header H with state root R; account A is absent under R.
    let ghost = Address::repeat_byte(0xA0);
    let contract = Address::repeat_byte(0xEE);
    let slot = B256::with_last_byte(7);
    transport.insert_account(
        contract,
        Account {
            balance: U256::from(1u64),
            ..Default::default()
        },
    );
    transport.insert_storage(contract, slot, Bytes::from_static(b"counter"));
    let header = transport.header(8);
    store.insert_header(header.clone());

    let ctx = FetchCtx::new();
    let (mut env, fault) = backend
        .call_environment_at(&ctx, call_from(ghost), BlockRef::Latest)
        .await
        .expect("building against an absent sender must succeed");

    // The sender exists inside the environment, pre-funded for simulation.
    let sender = env
        .state()
        .account(&ctx, ghost)
        .await
        .expect("read should succeed")
        .expect("sender created in the clone");
    assert_eq!(sender.balance, MAX_SIMULATION_BALANCE);

    // Simulated execution reads proven state and writes into the clone.
    let counter = env
        .state()
        .storage(&ctx, contract, slot)
        .await
        .expect("storage read should succeed")
        .expect("slot exists under the pinned root");
    assert_eq!(counter, Bytes::from_static(b"counter"));
    env.state_mut()
        .set_storage(contract, slot, Bytes::from_static(b"counter+1"));
    env.state_mut()
        .set_balance(&ctx, contract, U256::from(999u64))
        .await
        .expect("write should succeed");

    // No fault was raised.
    assert!(fault.fault().is_none());
    drop(env);

    // A separate view bound to the same header observes untouched state.
    let fresh = backend
        .state_by_ref(BlockRef::Latest)
        .expect("head resolves");
    assert!(fresh
        .account(&ctx, ghost)
        .await
        .expect("read should succeed")
        .is_none());
    assert_eq!(
        fresh
            .storage(&ctx, contract, slot)
            .await
            .expect("read should succeed"),
        Some(Bytes::from_static(b"counter"))
    );
    assert_eq!(
        fresh
            .balance(&ctx, contract)
            .await
            .expect("read should succeed"),
        U256::from(1u64)
    );
}

#[tokio::test]
async fn concurrent_simulations_are_causally_independent() {
    let (store, transport, backend) = backend_with_world();

    let sender = Address::repeat_byte(0xB0);
    transport.insert_account(
        sender,
        Account {
            nonce: 3,
            balance: U256::from(50u64),
            ..Default::default()
        },
    );
    let header = transport.header(8);
    store.insert_header(header.clone());

    let ctx = FetchCtx::new();
    let (mut first, _) = backend
        .call_environment(&ctx, call_from(sender), &header)
        .await
        .expect("first environment should build");
    let (second, _) = backend
        .call_environment(&ctx, call_from(sender), &header)
        .await
        .expect("second environment should build");

    first
        .state_mut()
        .set_nonce(&ctx, sender, 99)
        .await
        .expect("write should succeed");

    let from_second = second
        .state()
        .account(&ctx, sender)
        .await
        .expect("read should succeed")
        .expect("sender exists");
    assert_eq!(from_second.nonce, 3);
    assert_eq!(from_second.balance, MAX_SIMULATION_BALANCE);
}

#[tokio::test]
async fn retrieval_failures_during_build_surface_as_errors() {
    let (store, transport, backend) = backend_with_world();
    let header = transport.header(8);
    store.insert_header(header.clone());
    transport.fail_next_account_proof(RetrievalError::Transport("no peers".to_string()));

    let ctx = FetchCtx::new();
    let err = backend
        .call_environment(&ctx, call_from(Address::repeat_byte(0xC0)), &header)
        .await
        .expect_err("transport failure must surface");
    assert_eq!(err, RetrievalError::Transport("no peers".to_string()));
}

#[tokio::test]
async fn faults_raised_during_execution_reach_the_caller() {
    let (store, transport, backend) = backend_with_world();
    let header = transport.header(8);
    store.insert_header(header.clone());

    let ctx = FetchCtx::new();
    let (env, fault) = backend
        .call_environment(&ctx, call_from(Address::repeat_byte(0xD0)), &header)
        .await
        .expect("environment should build");

    // The execution engine hits a retrieval failure mid-call and records it.
    env.record_fault(ExecutionFault::Retrieval(RetrievalError::Timeout));
    // A second fault does not overwrite the first.
    env.record_fault(ExecutionFault::Execution("revert".to_string()));
    drop(env);

    assert_eq!(
        fault.fault(),
        Some(ExecutionFault::Retrieval(RetrievalError::Timeout))
    );
}
