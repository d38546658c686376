//! Shared read cache with per-key request coalescing.
//!
//! One [`StateCache`] is shared by a state view and all of its clones. It
//! holds verified facts only, values that passed proof verification against
//! the view's pinned root, plus the set of in-flight fetches. Facts are
//! root-pinned and immutable, so the cache supports negative entries
//! (`None` = proven absent) and never invalidates.
//!
//! Coalescing: the first caller to miss a key becomes the leader and gets a
//! [`FetchSlot::Lead`]; everyone else gets a [`FetchSlot::Join`] receiver
//! attached to the same in-flight request. Subscription and resolution are
//! serialized under one lock, so a joiner can never miss the outcome.

use alloy_primitives::{Address, Bytes, B256};
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use std::hash::Hash;
use tokio::sync::broadcast;

use wisp_core::error::RetrievalResult;
use wisp_core::types::Account;

/// Outcome of a coalesced account fetch, broadcast to every waiter.
pub type AccountOutcome = RetrievalResult<Option<Account>>;
/// Outcome of a coalesced storage fetch, broadcast to every waiter.
pub type StorageOutcome = RetrievalResult<Option<Bytes>>;

/// Storage cache key: (account, slot).
pub type SlotKey = (Address, B256);

/// Role handed to a caller that missed the cache.
pub enum FetchSlot<T> {
    /// This caller leads: it must drive the fetch and resolve the slot.
    Lead(broadcast::Sender<T>),
    /// Another fetch is in flight; await its broadcast outcome.
    Join(broadcast::Receiver<T>),
}

struct Inflight<K, T> {
    requests: Mutex<HashMap<K, broadcast::Sender<T>>>,
}

impl<K: Eq + Hash + Clone, T: Clone> Inflight<K, T> {
    fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    fn join_or_lead(&self, key: K) -> FetchSlot<T> {
        let mut requests = self.requests.lock();
        if let Some(sender) = requests.get(&key) {
            return FetchSlot::Join(sender.subscribe());
        }
        let (sender, _) = broadcast::channel(1);
        requests.insert(key, sender.clone());
        FetchSlot::Lead(sender)
    }

    /// Retire the in-flight entry and wake every waiter with `outcome`.
    fn resolve(&self, key: &K, sender: &broadcast::Sender<T>, outcome: T) {
        let mut requests = self.requests.lock();
        requests.remove(key);
        // Send while still holding the lock: joiners subscribe under the
        // same lock, so none can land between removal and send.
        let _ = sender.send(outcome);
    }

    fn len(&self) -> usize {
        self.requests.lock().len()
    }
}

/// Verified facts and in-flight fetches for one view family.
pub struct StateCache {
    accounts: RwLock<HashMap<Address, Option<Account>>>,
    storage: RwLock<HashMap<SlotKey, Option<Bytes>>>,
    inflight_accounts: Inflight<Address, AccountOutcome>,
    inflight_storage: Inflight<SlotKey, StorageOutcome>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            storage: RwLock::new(HashMap::new()),
            inflight_accounts: Inflight::new(),
            inflight_storage: Inflight::new(),
        }
    }

    /// Cached account fact: `None` = not cached, `Some(None)` = proven
    /// absent, `Some(Some(_))` = proven present.
    pub fn account(&self, address: &Address) -> Option<Option<Account>> {
        self.accounts.read().get(address).cloned()
    }

    /// Cached storage fact, same three-state shape as [`StateCache::account`].
    pub fn storage_slot(&self, key: &SlotKey) -> Option<Option<Bytes>> {
        self.storage.read().get(key).cloned()
    }

    /// Number of cached account facts.
    pub fn account_facts(&self) -> usize {
        self.accounts.read().len()
    }

    /// Number of fetches currently in flight across both key spaces.
    pub fn inflight(&self) -> usize {
        self.inflight_accounts.len() + self.inflight_storage.len()
    }

    /// Claim or join the in-flight fetch for an account.
    pub fn begin_account_fetch(&self, address: Address) -> FetchSlot<AccountOutcome> {
        self.inflight_accounts.join_or_lead(address)
    }

    /// Resolve an account fetch: cache the fact on success, wake waiters.
    ///
    /// Failures are broadcast but never cached; a later read retries.
    pub fn finish_account_fetch(
        &self,
        address: Address,
        sender: &broadcast::Sender<AccountOutcome>,
        outcome: AccountOutcome,
    ) {
        if let Ok(fact) = &outcome {
            self.accounts.write().insert(address, *fact);
        }
        self.inflight_accounts.resolve(&address, sender, outcome);
    }

    /// Claim or join the in-flight fetch for a storage slot.
    pub fn begin_storage_fetch(&self, key: SlotKey) -> FetchSlot<StorageOutcome> {
        self.inflight_storage.join_or_lead(key)
    }

    /// Resolve a storage fetch: cache the fact on success, wake waiters.
    pub fn finish_storage_fetch(
        &self,
        key: SlotKey,
        sender: &broadcast::Sender<StorageOutcome>,
        outcome: StorageOutcome,
    ) {
        if let Ok(fact) = &outcome {
            self.storage.write().insert(key, fact.clone());
        }
        self.inflight_storage.resolve(&key, sender, outcome);
    }
}
