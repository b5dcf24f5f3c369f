//! In-memory cache backend for testing and local mode.

use crate::adapter::{EntityKind, SipEntityCache};
use crate::error::{CacheError, CacheResult};
use crate::removal::{RemovalFeed, RemovedEntity};
use parking_lot::{Mutex, RwLock};
use sipha_snapshot::{DialogSnapshot, TransactionSnapshot};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An operation observed by the in-memory backend.
///
/// Tests assert on the recorded sequence to verify policy gating (which
/// writes happened, and which were correctly suppressed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    /// A dialog snapshot was stored.
    PutDialog(String),
    /// A dialog snapshot was replaced.
    UpdateDialog(String),
    /// A dialog record was deleted.
    RemoveDialog(String),
    /// A dialog record was evicted from the hot map.
    EvictDialog(String),
    /// A server transaction snapshot was stored.
    PutServerTransaction(String),
    /// A server transaction snapshot was replaced.
    UpdateServerTransaction(String),
    /// A server transaction record was deleted.
    RemoveServerTransaction(String),
    /// A server transaction record was evicted from the hot map.
    EvictServerTransaction(String),
    /// A client transaction snapshot was stored.
    PutClientTransaction(String),
    /// A client transaction snapshot was replaced.
    UpdateClientTransaction(String),
    /// A client transaction record was deleted.
    RemoveClientTransaction(String),
    /// A client transaction record was evicted from the hot map.
    EvictClientTransaction(String),
}

/// A hot/durable pair of maps for one entity kind.
///
/// Mirrors the layered behavior of a real distributed cache: eviction
/// drops the hot copy; reads fall back to the durable copy.
#[derive(Debug)]
struct Layered<T> {
    hot: HashMap<String, T>,
    durable: HashMap<String, T>,
}

// Manual impl: a derived one would demand `T: Default`, and snapshots
// have no meaningful default value.
impl<T> Default for Layered<T> {
    fn default() -> Self {
        Self {
            hot: HashMap::new(),
            durable: HashMap::new(),
        }
    }
}

impl<T: Clone> Layered<T> {
    fn get(&self, id: &str) -> Option<T> {
        self.hot.get(id).or_else(|| self.durable.get(id)).cloned()
    }

    fn put(&mut self, id: String, value: T) {
        self.hot.insert(id.clone(), value.clone());
        self.durable.insert(id, value);
    }

    fn remove(&mut self, id: &str) {
        self.hot.remove(id);
        self.durable.remove(id);
    }

    fn evict(&mut self, id: &str) {
        self.hot.remove(id);
    }
}

/// An in-memory snapshot store.
///
/// Suitable for unit/integration tests and for running a stack in local
/// mode. Besides the adapter contract it offers test hooks: an operation
/// recorder, an availability switch to simulate an unreachable store,
/// and remote-removal injection to exercise the purge path.
#[derive(Default)]
pub struct InMemoryCache {
    dialogs: RwLock<Layered<DialogSnapshot>>,
    server_transactions: RwLock<Layered<TransactionSnapshot>>,
    client_transactions: RwLock<Layered<TransactionSnapshot>>,
    available: AtomicBool,
    local_mode: AtomicBool,
    ops: Mutex<Vec<CacheOp>>,
    removal_feed: RemovalFeed,
}

impl InMemoryCache {
    /// Creates an available, clustered-mode cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Creates a cache reporting local mode.
    #[must_use]
    pub fn local() -> Self {
        let cache = Self::new();
        cache.local_mode.store(true, Ordering::SeqCst);
        cache
    }

    /// Simulates the store becoming (un)reachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns every operation observed so far, in order.
    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().clone()
    }

    /// Clears the operation recorder.
    pub fn clear_ops(&self) {
        self.ops.lock().clear();
    }

    /// Returns true if the durable copy of a dialog exists.
    pub fn has_durable_dialog(&self, dialog_id: &str) -> bool {
        self.dialogs.read().durable.contains_key(dialog_id)
    }

    /// Returns true if the hot copy of a dialog exists.
    pub fn has_hot_dialog(&self, dialog_id: &str) -> bool {
        self.dialogs.read().hot.contains_key(dialog_id)
    }

    /// Simulates another node deleting a record.
    ///
    /// Drops the record and pushes a notification through the removal
    /// feed, exactly as a distributed backend's change listener would.
    pub fn inject_remote_removal(&self, kind: EntityKind, entity_id: &str) {
        match kind {
            EntityKind::Dialog => self.dialogs.write().remove(entity_id),
            EntityKind::ServerTransaction => self.server_transactions.write().remove(entity_id),
            EntityKind::ClientTransaction => self.client_transactions.write().remove(entity_id),
        }
        self.removal_feed.emit(RemovedEntity {
            kind,
            entity_id: entity_id.to_owned(),
        });
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::unavailable("in-memory cache marked down"))
        }
    }

    fn record(&self, op: CacheOp) {
        self.ops.lock().push(op);
    }
}

impl SipEntityCache for InMemoryCache {
    fn get_dialog(&self, dialog_id: &str) -> CacheResult<Option<DialogSnapshot>> {
        self.check_available()?;
        Ok(self.dialogs.read().get(dialog_id))
    }

    fn put_dialog(&self, snapshot: &DialogSnapshot) -> CacheResult<()> {
        self.check_available()?;
        self.record(CacheOp::PutDialog(snapshot.dialog_id.clone()));
        self.dialogs
            .write()
            .put(snapshot.dialog_id.clone(), snapshot.clone());
        Ok(())
    }

    fn update_dialog(&self, dialog_id: &str, snapshot: &DialogSnapshot) -> CacheResult<()> {
        self.check_available()?;
        self.record(CacheOp::UpdateDialog(dialog_id.to_owned()));
        self.dialogs
            .write()
            .put(dialog_id.to_owned(), snapshot.clone());
        Ok(())
    }

    fn remove_dialog(&self, dialog_id: &str) {
        self.record(CacheOp::RemoveDialog(dialog_id.to_owned()));
        self.dialogs.write().remove(dialog_id);
    }

    fn evict_dialog(&self, dialog_id: &str) {
        self.record(CacheOp::EvictDialog(dialog_id.to_owned()));
        self.dialogs.write().evict(dialog_id);
    }

    fn get_server_transaction(
        &self,
        transaction_id: &str,
    ) -> CacheResult<Option<TransactionSnapshot>> {
        self.check_available()?;
        Ok(self.server_transactions.read().get(transaction_id))
    }

    fn put_server_transaction(&self, snapshot: &TransactionSnapshot) -> CacheResult<()> {
        self.check_available()?;
        self.record(CacheOp::PutServerTransaction(
            snapshot.transaction_id.clone(),
        ));
        self.server_transactions
            .write()
            .put(snapshot.transaction_id.clone(), snapshot.clone());
        Ok(())
    }

    fn update_server_transaction(
        &self,
        transaction_id: &str,
        snapshot: &TransactionSnapshot,
    ) -> CacheResult<()> {
        self.check_available()?;
        self.record(CacheOp::UpdateServerTransaction(transaction_id.to_owned()));
        self.server_transactions
            .write()
            .put(transaction_id.to_owned(), snapshot.clone());
        Ok(())
    }

    fn remove_server_transaction(&self, transaction_id: &str) {
        self.record(CacheOp::RemoveServerTransaction(transaction_id.to_owned()));
        self.server_transactions.write().remove(transaction_id);
    }

    fn evict_server_transaction(&self, transaction_id: &str) {
        self.record(CacheOp::EvictServerTransaction(transaction_id.to_owned()));
        self.server_transactions.write().evict(transaction_id);
    }

    fn get_client_transaction(
        &self,
        transaction_id: &str,
    ) -> CacheResult<Option<TransactionSnapshot>> {
        self.check_available()?;
        Ok(self.client_transactions.read().get(transaction_id))
    }

    fn put_client_transaction(&self, snapshot: &TransactionSnapshot) -> CacheResult<()> {
        self.check_available()?;
        self.record(CacheOp::PutClientTransaction(
            snapshot.transaction_id.clone(),
        ));
        self.client_transactions
            .write()
            .put(snapshot.transaction_id.clone(), snapshot.clone());
        Ok(())
    }

    fn update_client_transaction(
        &self,
        transaction_id: &str,
        snapshot: &TransactionSnapshot,
    ) -> CacheResult<()> {
        self.check_available()?;
        self.record(CacheOp::UpdateClientTransaction(transaction_id.to_owned()));
        self.client_transactions
            .write()
            .put(transaction_id.to_owned(), snapshot.clone());
        Ok(())
    }

    fn remove_client_transaction(&self, transaction_id: &str) {
        self.record(CacheOp::RemoveClientTransaction(transaction_id.to_owned()));
        self.client_transactions.write().remove(transaction_id);
    }

    fn evict_client_transaction(&self, transaction_id: &str) {
        self.record(CacheOp::EvictClientTransaction(transaction_id.to_owned()));
        self.client_transactions.write().evict(transaction_id);
    }

    fn in_local_mode(&self) -> bool {
        self.local_mode.load(Ordering::SeqCst)
    }

    fn removals(&self) -> Option<&RemovalFeed> {
        Some(&self.removal_feed)
    }
}
