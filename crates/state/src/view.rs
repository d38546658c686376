//! Header-pinned, copy-on-write state views.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use hashbrown::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use wisp_core::ctx::FetchCtx;
use wisp_core::error::{RetrievalError, RetrievalResult};
use wisp_core::types::{Account, Header};

use crate::cache::{FetchSlot, SlotKey, StateCache};
use crate::metrics::OptionalMetrics;
use crate::proof::{verify_account_proof, verify_storage_proof};
use crate::transport::ProofTransport;

/// Default bound on one on-demand fetch (transport + verification).
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning for a view family.
#[derive(Debug, Clone, Copy)]
pub struct ViewConfig {
    /// Hard bound on a single shared fetch. A caller's own context can give
    /// up earlier, but the in-flight request itself never outlives this.
    pub fetch_timeout: Duration,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Account/storage projection pinned to one header.
///
/// All reads are consistent with the header's state root: a miss fetches a
/// proof rooted there, verifies it locally, and only then caches the fact. A
/// view is never rebound to a different header.
///
/// # Cloning
///
/// `clone()` is the copy-on-write fork: the clone shares the verified-fact
/// cache and in-flight fetch set (root-pinned facts never change, so sharing
/// is safe), takes a snapshot of the parent's overlay, and keeps all further
/// writes private. Nothing written to a clone is ever visible to the parent,
/// to sibling clones, or to the shared cache.
///
/// Reads within one view observe that view's own writes. Independent clones
/// are causally unrelated by design.
#[derive(Clone)]
pub struct StateView {
    header: Header,
    shared: Arc<StateCache>,
    transport: Arc<dyn ProofTransport>,
    config: ViewConfig,
    metrics: OptionalMetrics,
    overlay_accounts: HashMap<Address, Account>,
    overlay_storage: HashMap<SlotKey, Bytes>,
}

impl StateView {
    /// View pinned to `header`, with default config and no metrics.
    pub fn new(header: Header, transport: Arc<dyn ProofTransport>) -> Self {
        Self::with_config(header, transport, ViewConfig::default(), OptionalMetrics::disabled())
    }

    /// View pinned to `header` with explicit config and metrics.
    pub fn with_config(
        header: Header,
        transport: Arc<dyn ProofTransport>,
        config: ViewConfig,
        metrics: OptionalMetrics,
    ) -> Self {
        Self {
            header,
            shared: Arc::new(StateCache::new()),
            transport,
            config,
            metrics,
            overlay_accounts: HashMap::new(),
            overlay_storage: HashMap::new(),
        }
    }

    /// The header this view is pinned to.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The state root every read is verified against.
    pub fn state_root(&self) -> B256 {
        self.header.state_root
    }

    /// The shared verified-fact cache (for inspection in tests/metrics).
    pub fn cache(&self) -> &Arc<StateCache> {
        &self.shared
    }

    /// Account at `address`, or `None` if provably absent.
    ///
    /// Resolution order: this view's private writes, then the shared
    /// verified-fact cache, then a coalesced on-demand fetch bounded by
    /// `ctx` for this caller and by the view's fetch timeout overall.
    pub async fn account(
        &self,
        ctx: &FetchCtx,
        address: Address,
    ) -> RetrievalResult<Option<Account>> {
        if let Some(account) = self.overlay_accounts.get(&address) {
            return Ok(Some(*account));
        }
        if let Some(fact) = self.shared.account(&address) {
            self.metrics.record_cache_hit();
            return Ok(fact);
        }
        self.metrics.record_cache_miss();

        let rx = match self.shared.begin_account_fetch(address) {
            FetchSlot::Join(rx) => {
                self.metrics.record_coalesced_wait();
                debug!(%address, "joining in-flight account fetch");
                rx
            }
            FetchSlot::Lead(sender) => {
                let rx = sender.subscribe();
                self.spawn_account_fetch(address, sender);
                rx
            }
        };
        Self::await_outcome(ctx, rx).await
    }

    /// Storage value of `slot` under `address`, or `None` if provably
    /// absent (including when the account itself is absent).
    pub async fn storage(
        &self,
        ctx: &FetchCtx,
        address: Address,
        slot: B256,
    ) -> RetrievalResult<Option<Bytes>> {
        let key = (address, slot);
        if let Some(value) = self.overlay_storage.get(&key) {
            return Ok(Some(value.clone()));
        }
        if let Some(fact) = self.shared.storage_slot(&key) {
            self.metrics.record_cache_hit();
            return Ok(fact);
        }
        // An account proven absent has no slots; skip the network.
        if let Some(None) = self.shared.account(&address) {
            self.metrics.record_cache_hit();
            return Ok(None);
        }
        self.metrics.record_cache_miss();

        let rx = match self.shared.begin_storage_fetch(key) {
            FetchSlot::Join(rx) => {
                self.metrics.record_coalesced_wait();
                debug!(%address, %slot, "joining in-flight storage fetch");
                rx
            }
            FetchSlot::Lead(sender) => {
                let rx = sender.subscribe();
                self.spawn_storage_fetch(key, sender);
                rx
            }
        };
        Self::await_outcome(ctx, rx).await
    }

    /// Balance convenience: absent accounts have zero balance.
    pub async fn balance(&self, ctx: &FetchCtx, address: Address) -> RetrievalResult<U256> {
        Ok(self
            .account(ctx, address)
            .await?
            .map_or(U256::ZERO, |a| a.balance))
    }

    /// Nonce convenience: absent accounts have nonce zero.
    pub async fn nonce(&self, ctx: &FetchCtx, address: Address) -> RetrievalResult<u64> {
        Ok(self.account(ctx, address).await?.map_or(0, |a| a.nonce))
    }

    /// Account at `address`, or a fresh empty record if absent.
    ///
    /// Does not write; combine with [`StateView::put_account`] to create.
    pub async fn account_or_default(
        &self,
        ctx: &FetchCtx,
        address: Address,
    ) -> RetrievalResult<Account> {
        Ok(self.account(ctx, address).await?.unwrap_or_default())
    }

    /// Record an account in this view's private overlay.
    pub fn put_account(&mut self, address: Address, account: Account) {
        self.overlay_accounts.insert(address, account);
    }

    /// Overwrite the balance of `address` in this view only, creating the
    /// account if it has never existed on chain.
    pub async fn set_balance(
        &mut self,
        ctx: &FetchCtx,
        address: Address,
        balance: U256,
    ) -> RetrievalResult<()> {
        let mut account = self.account_or_default(ctx, address).await?;
        account.balance = balance;
        self.put_account(address, account);
        Ok(())
    }

    /// Overwrite the nonce of `address` in this view only.
    pub async fn set_nonce(
        &mut self,
        ctx: &FetchCtx,
        address: Address,
        nonce: u64,
    ) -> RetrievalResult<()> {
        let mut account = self.account_or_default(ctx, address).await?;
        account.nonce = nonce;
        self.put_account(address, account);
        Ok(())
    }

    /// Write a storage slot in this view only.
    pub fn set_storage(&mut self, address: Address, slot: B256, value: Bytes) {
        self.overlay_storage.insert((address, slot), value);
    }

    /// Await a broadcast fetch outcome under the caller's context.
    async fn await_outcome<T: Clone>(
        ctx: &FetchCtx,
        mut rx: broadcast::Receiver<RetrievalResult<T>>,
    ) -> RetrievalResult<T> {
        ctx.run(async move {
            match rx.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(RetrievalError::Transport(
                    "in-flight fetch dropped".to_string(),
                )),
            }
        })
        .await
    }

    /// Drive the shared account fetch on a detached task.
    ///
    /// Detached so one caller's cancellation never tears down a request
    /// other waiters are attached to; the fetch itself is bounded by the
    /// view's fetch timeout, and a completed result warms the cache even if
    /// every waiter has given up.
    fn spawn_account_fetch(
        &self,
        address: Address,
        sender: broadcast::Sender<crate::cache::AccountOutcome>,
    ) {
        self.metrics.record_fetch();
        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        let root = self.header.state_root;
        let fetch_timeout = self.config.fetch_timeout;
        let metrics = self.metrics.clone();
        debug!(%address, %root, "fetching account proof");

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let fetch_ctx = FetchCtx::with_timeout(fetch_timeout);
            let outcome = fetch_ctx
                .run(async {
                    let proof = transport.account_proof(&fetch_ctx, root, address).await?;
                    verify_account_proof(root, address, &proof)
                })
                .await;
            metrics.record_fetch_latency(started.elapsed().as_secs_f64());
            Self::note_failure(&metrics, &outcome, "account", &address);
            shared.finish_account_fetch(address, &sender, outcome);
        });
    }

    /// Drive the shared storage fetch on a detached task.
    fn spawn_storage_fetch(
        &self,
        key: SlotKey,
        sender: broadcast::Sender<crate::cache::StorageOutcome>,
    ) {
        self.metrics.record_fetch();
        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        let root = self.header.state_root;
        let fetch_timeout = self.config.fetch_timeout;
        let metrics = self.metrics.clone();
        let (address, slot) = key;
        debug!(%address, %slot, %root, "fetching storage proof");

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let fetch_ctx = FetchCtx::with_timeout(fetch_timeout);
            let outcome = fetch_ctx
                .run(async {
                    let proof = transport
                        .storage_proof(&fetch_ctx, root, address, slot)
                        .await?;
                    verify_storage_proof(root, address, slot, &proof)
                })
                .await;
            metrics.record_fetch_latency(started.elapsed().as_secs_f64());
            Self::note_failure(&metrics, &outcome, "storage", &address);
            shared.finish_storage_fetch(key, &sender, outcome);
        });
    }

    fn note_failure<T>(
        metrics: &OptionalMetrics,
        outcome: &RetrievalResult<T>,
        kind: &str,
        address: &Address,
    ) {
        match outcome {
            Ok(_) => {}
            Err(RetrievalError::InvalidProof(reason)) => {
                metrics.record_fetch_failure();
                metrics.record_invalid_proof();
                warn!(%address, kind, %reason, "rejected proof");
            }
            Err(err) => {
                metrics.record_fetch_failure();
                debug!(%address, kind, %err, "fetch failed");
            }
        }
    }
}
