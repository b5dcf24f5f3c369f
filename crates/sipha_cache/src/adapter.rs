//! Cache adapter trait definition.

use crate::error::CacheResult;
use crate::removal::RemovalFeed;
use sipha_snapshot::{DialogSnapshot, TransactionSnapshot};

/// The kind of replicated entity a cache record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A dialog record.
    Dialog,
    /// A server transaction record.
    ServerTransaction,
    /// A client transaction record.
    ClientTransaction,
}

/// A pluggable snapshot store for replicated SIP entities.
///
/// Implementations are **dumb stores**: the replication engine owns all
/// versioning, policy, and merge decisions. A backend may be an
/// in-process map, a distributed hash table, or a disk-backed cache; the
/// engine does not care.
///
/// # Invariants
///
/// - `get_*` returns the most recent snapshot successfully written for
///   the id, or `None`
/// - `remove_*` deletes the durable record; it never fails loudly
/// - `evict_*` drops only the hot in-memory copy; a later `get` may
///   still serve the record from durable storage
/// - Implementations must be `Send + Sync`; the engine calls them from
///   whatever thread is driving protocol processing
pub trait SipEntityCache: Send + Sync {
    /// Fetches a dialog snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn get_dialog(&self, dialog_id: &str) -> CacheResult<Option<DialogSnapshot>>;

    /// Stores a dialog snapshot for the first time.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn put_dialog(&self, snapshot: &DialogSnapshot) -> CacheResult<()>;

    /// Replaces the stored snapshot for an existing dialog.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn update_dialog(&self, dialog_id: &str, snapshot: &DialogSnapshot) -> CacheResult<()>;

    /// Deletes a dialog record. Best-effort; never surfaces a failure.
    fn remove_dialog(&self, dialog_id: &str);

    /// Drops the hot copy of a dialog record, keeping the durable copy.
    fn evict_dialog(&self, dialog_id: &str);

    /// Fetches a server transaction snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn get_server_transaction(&self, transaction_id: &str)
        -> CacheResult<Option<TransactionSnapshot>>;

    /// Stores a server transaction snapshot for the first time.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn put_server_transaction(&self, snapshot: &TransactionSnapshot) -> CacheResult<()>;

    /// Replaces the stored snapshot for an existing server transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn update_server_transaction(
        &self,
        transaction_id: &str,
        snapshot: &TransactionSnapshot,
    ) -> CacheResult<()>;

    /// Deletes a server transaction record. Best-effort.
    fn remove_server_transaction(&self, transaction_id: &str);

    /// Drops the hot copy of a server transaction record.
    fn evict_server_transaction(&self, transaction_id: &str);

    /// Fetches a client transaction snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn get_client_transaction(&self, transaction_id: &str)
        -> CacheResult<Option<TransactionSnapshot>>;

    /// Stores a client transaction snapshot for the first time.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn put_client_transaction(&self, snapshot: &TransactionSnapshot) -> CacheResult<()>;

    /// Replaces the stored snapshot for an existing client transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Unavailable`] if the store is
    /// unreachable.
    fn update_client_transaction(
        &self,
        transaction_id: &str,
        snapshot: &TransactionSnapshot,
    ) -> CacheResult<()>;

    /// Deletes a client transaction record. Best-effort.
    fn remove_client_transaction(&self, transaction_id: &str);

    /// Drops the hot copy of a client transaction record.
    fn evict_client_transaction(&self, transaction_id: &str);

    /// Returns true when the node runs without a cluster.
    ///
    /// In local mode the engine skips every replication write and every
    /// recovery read.
    fn in_local_mode(&self) -> bool;

    /// Returns the backend's remote-removal feed, if it produces one.
    ///
    /// Backends that observe non-local deletions (e.g. a distributed
    /// store's change listener) push them here; backends without such a
    /// mechanism return `None`.
    fn removals(&self) -> Option<&RemovalFeed> {
        None
    }
}
