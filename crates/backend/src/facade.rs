//! The backend facade: single entry point for RPC handlers.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use tracing::info;

use wisp_core::block_ref::BlockRef;
use wisp_core::ctx::FetchCtx;
use wisp_core::error::RetrievalResult;
use wisp_core::store::ChainStore;
use wisp_core::types::{Block, CallMessage, ChainSpec, Header, Receipt, Transaction};
use wisp_state::{OptionalMetrics, ProofTransport, StateView, ViewConfig};

use crate::compiler::{CompilerCache, CompilerError, SourceCompiler};
use crate::env::{build_call_environment, CallEnvironment, FaultSlot};
use crate::error::{BackendError, BackendResult, PoolResult};
use crate::events::EventMux;
use crate::resolver::HeadResolver;
use crate::traits::{AccountManager, Downloader, GasPriceOracle, TxPool};

/// Static configuration for a backend instance.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Chain parameters handed to every call environment.
    pub spec: ChainSpec,
    /// Light protocol version reported to the API layer.
    pub protocol_version: u32,
    /// Configured path of the optional source compiler.
    pub compiler_path: PathBuf,
    /// Tuning for proof-backed state views.
    pub view: ViewConfig,
}

/// Read/execute-path facade of a light node.
///
/// Owns none of the long-lived collaborators; it borrows shared handles and
/// composes them: resolve a block reference, materialize a proof-backed
/// view, build an isolated call environment. Everything else is a verbatim
/// pass-through. Per-request objects (views, environments) are constructed
/// here and never pooled.
pub struct LightBackend {
    store: Arc<dyn ChainStore>,
    transport: Arc<dyn ProofTransport>,
    pool: Arc<dyn TxPool>,
    oracle: Arc<dyn GasPriceOracle>,
    account_manager: Option<Arc<dyn AccountManager>>,
    downloader: Option<Arc<dyn Downloader>>,
    events: Arc<EventMux>,
    resolver: HeadResolver,
    compiler: CompilerCache,
    view_metrics: OptionalMetrics,
    config: BackendConfig,
}

impl LightBackend {
    pub fn new(
        store: Arc<dyn ChainStore>,
        transport: Arc<dyn ProofTransport>,
        pool: Arc<dyn TxPool>,
        oracle: Arc<dyn GasPriceOracle>,
        config: BackendConfig,
    ) -> Self {
        let resolver = HeadResolver::new(Arc::clone(&store));
        let compiler = CompilerCache::new(&config.compiler_path);
        Self {
            store,
            transport,
            pool,
            oracle,
            account_manager: None,
            downloader: None,
            events: Arc::new(EventMux::default()),
            resolver,
            compiler,
            view_metrics: OptionalMetrics::disabled(),
            config,
        }
    }

    /// Attach an account manager handle.
    pub fn with_account_manager(mut self, manager: Arc<dyn AccountManager>) -> Self {
        self.account_manager = Some(manager);
        self
    }

    /// Attach a sync engine handle.
    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Attach metrics shared by every state view this backend builds.
    pub fn with_view_metrics(mut self, metrics: OptionalMetrics) -> Self {
        self.view_metrics = metrics;
        self
    }

    // --- head and chain data -------------------------------------------------

    /// Rewind the chain head.
    pub fn set_head(&self, number: u64) {
        self.store.set_head(number);
    }

    /// The committed head header.
    pub fn current_header(&self) -> Header {
        self.store.current_header()
    }

    /// Resolve a block reference, `None` if out of range.
    pub fn header_by_ref(&self, block_ref: BlockRef) -> Option<Header> {
        self.resolver.resolve(block_ref)
    }

    /// Resolve a block reference where a header is mandatory.
    pub fn require_header(&self, block_ref: BlockRef) -> BackendResult<Header> {
        self.header_by_ref(block_ref)
            .ok_or(BackendError::InvalidReference(block_ref))
    }

    /// Block for a reference: absent header short-circuits to `Ok(None)`
    /// without touching the network.
    pub async fn block_by_ref(
        &self,
        ctx: &FetchCtx,
        block_ref: BlockRef,
    ) -> RetrievalResult<Option<Block>> {
        let Some(header) = self.header_by_ref(block_ref) else {
            return Ok(None);
        };
        self.store.block_by_hash(ctx, header.hash).await
    }

    /// Block body by hash (network-backed pass-through).
    pub async fn block_by_hash(
        &self,
        ctx: &FetchCtx,
        hash: B256,
    ) -> RetrievalResult<Option<Block>> {
        self.store.block_by_hash(ctx, hash).await
    }

    /// Receipts by block hash (network-backed pass-through).
    pub async fn receipts_by_hash(
        &self,
        ctx: &FetchCtx,
        hash: B256,
    ) -> RetrievalResult<Option<Vec<Receipt>>> {
        self.store.receipts_by_hash(ctx, hash).await
    }

    /// Total chain weight at a block.
    pub fn total_difficulty(&self, hash: B256) -> Option<U256> {
        self.store.total_difficulty(hash)
    }

    // --- state views and call environments -----------------------------------

    /// Fresh proof-backed view pinned to `header`.
    pub fn state_at(&self, header: &Header) -> StateView {
        StateView::with_config(
            header.clone(),
            Arc::clone(&self.transport),
            self.config.view,
            self.view_metrics.clone(),
        )
    }

    /// Fresh view for a reference, `None` if it does not resolve.
    pub fn state_by_ref(&self, block_ref: BlockRef) -> Option<StateView> {
        Some(self.state_at(&self.header_by_ref(block_ref)?))
    }

    /// Build an isolated call environment for `message` against `header`.
    ///
    /// The environment executes against a private clone with the sender
    /// balance overridden; the caller runs the message and then consumes
    /// the returned fault slot.
    pub async fn call_environment(
        &self,
        ctx: &FetchCtx,
        message: CallMessage,
        header: &Header,
    ) -> RetrievalResult<(CallEnvironment, FaultSlot)> {
        let parent = self.state_at(header);
        build_call_environment(ctx, message, &parent, self.config.spec.clone()).await
    }

    /// Resolve `block_ref` and build a call environment against it.
    pub async fn call_environment_at(
        &self,
        ctx: &FetchCtx,
        message: CallMessage,
        block_ref: BlockRef,
    ) -> BackendResult<(CallEnvironment, FaultSlot)> {
        let header = self.require_header(block_ref)?;
        Ok(self.call_environment(ctx, message, &header).await?)
    }

    // --- transaction pool pass-throughs --------------------------------------

    /// Submit a signed transaction to the pool.
    pub async fn send_transaction(&self, ctx: &FetchCtx, tx: Transaction) -> PoolResult<()> {
        let hash = tx.hash;
        self.pool.add(ctx, tx).await?;
        info!(%hash, "transaction submitted to pool");
        Ok(())
    }

    /// Drop a transaction from the pool.
    pub fn remove_transaction(&self, hash: B256) {
        self.pool.remove(hash);
    }

    /// All pooled transactions.
    pub fn pool_transactions(&self) -> Vec<Transaction> {
        self.pool.all()
    }

    /// One pooled transaction by hash.
    pub fn pool_transaction(&self, hash: B256) -> Option<Transaction> {
        self.pool.get(hash)
    }

    /// Pool-aware nonce for an address.
    pub async fn pool_nonce(&self, ctx: &FetchCtx, address: Address) -> RetrievalResult<u64> {
        self.pool.nonce(ctx, address).await
    }

    /// `(pending, queued)` pool counts; a light pool has no queued set.
    pub fn pool_stats(&self) -> (usize, usize) {
        (self.pool.pending_count(), 0)
    }

    /// Pending/queued pool content by sender. A light client keeps no
    /// content view, so both maps are empty.
    pub fn pool_content(
        &self,
    ) -> (
        BTreeMap<Address, Vec<Transaction>>,
        BTreeMap<Address, Vec<Transaction>>,
    ) {
        (BTreeMap::new(), BTreeMap::new())
    }

    // --- metadata and handles ------------------------------------------------

    /// Memoized source-compiler handle.
    pub fn compiler(&self) -> Result<Arc<SourceCompiler>, CompilerError> {
        self.compiler.get()
    }

    /// Reconfigure the compiler path and rebuild the handle.
    pub fn set_compiler_path(
        &self,
        path: impl Into<PathBuf>,
    ) -> Result<Arc<SourceCompiler>, CompilerError> {
        self.compiler.set_path(path)
    }

    /// Light protocol version reported to the API layer.
    pub fn protocol_version(&self) -> u32 {
        self.config.protocol_version
    }

    /// Suggested gas price from the oracle.
    pub async fn suggest_gas_price(&self, ctx: &FetchCtx) -> RetrievalResult<U256> {
        self.oracle.suggest(ctx).await
    }

    /// Chain parameters.
    pub fn chain_spec(&self) -> &ChainSpec {
        &self.config.spec
    }

    /// Chain event subscription handle.
    pub fn event_mux(&self) -> Arc<EventMux> {
        Arc::clone(&self.events)
    }

    /// Account manager handle, if attached.
    pub fn account_manager(&self) -> Option<Arc<dyn AccountManager>> {
        self.account_manager.as_ref().map(Arc::clone)
    }

    /// Sync engine handle, if attached.
    pub fn downloader(&self) -> Option<Arc<dyn Downloader>> {
        self.downloader.as_ref().map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use wisp_core::error::RetrievalError;
    use wisp_core::mock::{test_header, MockChainStore};
    use wisp_core::types::Account;
    use wisp_state::mock::MockTransport;

    use crate::env::MAX_SIMULATION_BALANCE;
    use crate::mock::{MockTxPool, StaticAccountManager, StaticDownloader, StaticOracle};

    struct Harness {
        store: Arc<MockChainStore>,
        transport: Arc<MockTransport>,
        pool: Arc<MockTxPool>,
        oracle: Arc<StaticOracle>,
        backend: LightBackend,
    }

    fn harness_at_height(head: u64) -> Harness {
        let store = Arc::new(MockChainStore::with_height(head));
        let transport = Arc::new(MockTransport::new());
        let pool = Arc::new(MockTxPool::new());
        let oracle = Arc::new(StaticOracle::new(U256::from(13u64)));

        let backend = LightBackend::new(
            Arc::clone(&store) as Arc<dyn ChainStore>,
            Arc::clone(&transport) as Arc<dyn ProofTransport>,
            Arc::clone(&pool) as Arc<dyn TxPool>,
            Arc::clone(&oracle) as Arc<dyn GasPriceOracle>,
            BackendConfig {
                spec: ChainSpec::new(77, "wisp-test"),
                protocol_version: 2,
                compiler_path: PathBuf::from("/nonexistent/wisp-solc"),
                view: ViewConfig::default(),
            },
        );

        Harness {
            store,
            transport,
            pool,
            oracle,
            backend,
        }
    }

    fn signed_tx(tag: u8) -> Transaction {
        Transaction {
            hash: B256::repeat_byte(tag),
            from: Address::repeat_byte(tag),
            to: Some(Address::repeat_byte(0xEE)),
            nonce: 0,
            value: U256::from(1u64),
            gas_limit: 21_000,
            gas_price: U256::from(1u64),
            input: Bytes::new(),
        }
    }

    fn message_from(sender: Address) -> CallMessage {
        CallMessage {
            from: sender,
            to: Some(Address::repeat_byte(0xEE)),
            value: U256::ZERO,
            gas_limit: 1_000_000,
            gas_price: U256::from(1u64),
            input: Bytes::new(),
        }
    }

    #[test]
    fn latest_and_pending_resolve_identically() {
        let h = harness_at_height(9);

        let latest = h.backend.header_by_ref(BlockRef::Latest).expect("head");
        let pending = h.backend.header_by_ref(BlockRef::Pending).expect("head");

        assert_eq!(latest, pending);
        assert_eq!(latest, h.backend.current_header());
    }

    #[test]
    fn out_of_range_reference_is_invalid_where_required() {
        let h = harness_at_height(9);

        assert!(h.backend.header_by_ref(BlockRef::Number(10)).is_none());
        let err = h
            .backend
            .require_header(BlockRef::Number(10))
            .expect_err("beyond head must be invalid");
        assert_eq!(err, BackendError::InvalidReference(BlockRef::Number(10)));
    }

    #[test]
    fn set_head_rewinds_resolution() {
        let h = harness_at_height(9);
        h.backend.set_head(3);

        assert_eq!(h.backend.current_header().number, 3);
        assert!(h.backend.header_by_ref(BlockRef::Number(7)).is_none());
    }

    #[tokio::test]
    async fn block_by_ref_short_circuits_on_absent_header() {
        let h = harness_at_height(9);
        h.store
            .fail_next_block_by_hash(RetrievalError::Transport("must not be called".into()));

        let ctx = FetchCtx::new();
        let block = h
            .backend
            .block_by_ref(&ctx, BlockRef::Number(99))
            .await
            .expect("absent header is not an error");
        assert!(block.is_none());
    }

    #[tokio::test]
    async fn block_by_ref_fetches_the_resolved_header() {
        let h = harness_at_height(9);
        let header = test_header(5);
        h.store.insert_block(Block {
            header: header.clone(),
            transactions: vec![signed_tx(0x31)],
        });

        let ctx = FetchCtx::new();
        let block = h
            .backend
            .block_by_ref(&ctx, BlockRef::Number(5))
            .await
            .expect("lookup should succeed")
            .expect("block should exist");
        assert_eq!(block.hash(), header.hash);
        assert_eq!(block.transactions.len(), 1);
    }

    #[tokio::test]
    async fn receipts_and_difficulty_pass_through() {
        let h = harness_at_height(3);
        let hash = test_header(2).hash;
        h.store.insert_receipts(
            hash,
            vec![Receipt {
                transaction_hash: B256::repeat_byte(0x41),
                gas_used: 21_000,
                status: 1,
                logs: vec![],
            }],
        );
        h.store.insert_difficulty(hash, U256::from(1000u64));

        let ctx = FetchCtx::new();
        let receipts = h
            .backend
            .receipts_by_hash(&ctx, hash)
            .await
            .expect("lookup should succeed")
            .expect("receipts should exist");
        assert_eq!(receipts.len(), 1);
        assert_eq!(h.backend.total_difficulty(hash), Some(U256::from(1000u64)));
        assert!(h
            .backend
            .total_difficulty(B256::repeat_byte(0x99))
            .is_none());
    }

    #[test]
    fn state_by_ref_builds_a_pinned_view() {
        let h = harness_at_height(3);
        let header = h.transport.header(2);
        h.store.insert_header(header.clone());
        h.store.set_head(2);

        let view = h
            .backend
            .state_by_ref(BlockRef::Latest)
            .expect("head resolves");
        assert_eq!(view.state_root(), header.state_root);
        assert!(h.backend.state_by_ref(BlockRef::Number(50)).is_none());
    }

    #[tokio::test]
    async fn call_environment_funds_the_sender_only_in_the_clone() {
        let h = harness_at_height(1);
        let sender = Address::repeat_byte(0x51);
        h.transport.insert_account(
            sender,
            Account {
                balance: U256::from(5u64),
                ..Default::default()
            },
        );
        // Pin a header whose root matches the programmed world.
        let header = h.transport.header(1);
        h.store.insert_header(header.clone());

        let ctx = FetchCtx::new();
        let (env, fault) = h
            .backend
            .call_environment(&ctx, message_from(sender), &header)
            .await
            .expect("build should succeed");

        let simulated = env
            .state()
            .account(&ctx, sender)
            .await
            .expect("read should succeed")
            .expect("sender exists");
        assert_eq!(simulated.balance, MAX_SIMULATION_BALANCE);
        assert!(fault.fault().is_none());

        // An independent view still sees the real balance.
        let independent = h.backend.state_at(&header);
        assert_eq!(
            independent
                .balance(&ctx, sender)
                .await
                .expect("read should succeed"),
            U256::from(5u64)
        );
    }

    #[tokio::test]
    async fn call_environment_at_rejects_unresolvable_references() {
        let h = harness_at_height(1);

        let ctx = FetchCtx::new();
        let err = h
            .backend
            .call_environment_at(&ctx, message_from(Address::ZERO), BlockRef::Number(9))
            .await
            .expect_err("unresolvable reference must fail");
        assert_eq!(err, BackendError::InvalidReference(BlockRef::Number(9)));
    }

    #[tokio::test]
    async fn pool_pass_throughs_forward_results_verbatim() {
        let h = harness_at_height(1);
        let tx = signed_tx(0x61);
        let hash = tx.hash;

        let ctx = FetchCtx::new();
        h.backend
            .send_transaction(&ctx, tx.clone())
            .await
            .expect("submission should succeed");

        assert_eq!(h.backend.pool_transaction(hash), Some(tx.clone()));
        assert_eq!(h.backend.pool_transactions(), vec![tx]);
        assert_eq!(h.backend.pool_stats(), (1, 0));

        h.backend.remove_transaction(hash);
        assert!(h.backend.pool_transaction(hash).is_none());
        assert_eq!(h.backend.pool_stats(), (0, 0));

        let (pending, queued) = h.backend.pool_content();
        assert!(pending.is_empty() && queued.is_empty());
    }

    #[tokio::test]
    async fn pool_rejection_reason_is_forwarded_verbatim() {
        let h = harness_at_height(1);
        h.pool.reject_next("nonce too low");

        let ctx = FetchCtx::new();
        let err = h
            .backend
            .send_transaction(&ctx, signed_tx(0x62))
            .await
            .expect_err("armed rejection must surface");
        assert_eq!(
            BackendError::from(err),
            BackendError::PoolRejected("nonce too low".to_string())
        );
    }

    #[tokio::test]
    async fn pool_nonce_and_failures_pass_through() {
        let h = harness_at_height(1);
        let address = Address::repeat_byte(0x63);
        h.pool.set_nonce(address, 11);

        let ctx = FetchCtx::new();
        assert_eq!(
            h.backend
                .pool_nonce(&ctx, address)
                .await
                .expect("nonce query should succeed"),
            11
        );

        h.pool.fail_next_nonce(RetrievalError::Timeout);
        assert_eq!(
            h.backend.pool_nonce(&ctx, address).await,
            Err(RetrievalError::Timeout)
        );
    }

    #[tokio::test]
    async fn oracle_price_and_failures_pass_through() {
        let h = harness_at_height(1);

        let ctx = FetchCtx::new();
        assert_eq!(
            h.backend
                .suggest_gas_price(&ctx)
                .await
                .expect("suggestion should succeed"),
            U256::from(13u64)
        );

        h.oracle.fail_next(RetrievalError::Cancelled);
        assert_eq!(
            h.backend.suggest_gas_price(&ctx).await,
            Err(RetrievalError::Cancelled)
        );
    }

    #[test]
    fn metadata_and_handles() {
        let manager = Arc::new(StaticAccountManager::new(vec![Address::repeat_byte(0x71)]));
        let downloader = Arc::new(StaticDownloader::synced_at(42));
        let h = harness_at_height(1);
        let backend = h
            .backend
            .with_account_manager(Arc::clone(&manager) as Arc<dyn AccountManager>)
            .with_downloader(Arc::clone(&downloader) as Arc<dyn Downloader>);

        assert_eq!(backend.protocol_version(), 2);
        assert_eq!(backend.chain_spec().chain_id, 77);
        assert_eq!(
            backend
                .account_manager()
                .expect("manager attached")
                .accounts(),
            vec![Address::repeat_byte(0x71)]
        );
        assert_eq!(
            backend
                .downloader()
                .expect("downloader attached")
                .progress()
                .current_block,
            42
        );

        let mux = backend.event_mux();
        assert_eq!(mux.subscriber_count(), 0);
    }

    #[test]
    fn missing_compiler_is_reported_not_fatal() {
        let h = harness_at_height(1);
        assert!(matches!(
            h.backend.compiler(),
            Err(CompilerError::NotFound(_))
        ));
    }
}
