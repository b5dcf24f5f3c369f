//! Id-keyed tables for live entities and transport channels.
//!
//! Entities refer to each other and to channels by id, never by
//! reference: a transaction names its dialog with a `String`, a dialog
//! names its channel with a [`ChannelId`]. Dropping one entity can never
//! keep another alive.

use crate::dialog::Dialog;
use crate::transaction::Transaction;
use crate::transport::{ChannelHandle, ChannelId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Owner of every live entity the engine knows about.
#[derive(Default)]
pub struct EntityArena {
    dialogs: RwLock<HashMap<String, Dialog>>,
    server_transactions: RwLock<HashMap<String, Transaction>>,
    client_transactions: RwLock<HashMap<String, Transaction>>,
    channels: RwLock<HashMap<ChannelId, ChannelHandle>>,
    next_channel: AtomicU64,
}

impl EntityArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a dialog, replacing any previous one with the same id.
    pub fn insert_dialog(&self, dialog: Dialog) {
        self.dialogs.write().insert(dialog.id().to_string(), dialog);
    }

    /// Removes a dialog.
    pub fn remove_dialog(&self, dialog_id: &str) -> Option<Dialog> {
        self.dialogs.write().remove(dialog_id)
    }

    /// Returns true if a live dialog with this id exists.
    pub fn contains_dialog(&self, dialog_id: &str) -> bool {
        self.dialogs.read().contains_key(dialog_id)
    }

    /// Runs `f` against the named dialog, if present.
    pub fn with_dialog<R>(&self, dialog_id: &str, f: impl FnOnce(&Dialog) -> R) -> Option<R> {
        self.dialogs.read().get(dialog_id).map(f)
    }

    /// Runs `f` against the named dialog mutably, if present.
    pub fn with_dialog_mut<R>(
        &self,
        dialog_id: &str,
        f: impl FnOnce(&mut Dialog) -> R,
    ) -> Option<R> {
        self.dialogs.write().get_mut(dialog_id).map(f)
    }

    /// Number of live dialogs.
    pub fn dialog_count(&self) -> usize {
        self.dialogs.read().len()
    }

    /// Inserts a server transaction.
    pub fn insert_server_transaction(&self, transaction: Transaction) {
        self.server_transactions
            .write()
            .insert(transaction.id().to_string(), transaction);
    }

    /// Inserts a client transaction.
    pub fn insert_client_transaction(&self, transaction: Transaction) {
        self.client_transactions
            .write()
            .insert(transaction.id().to_string(), transaction);
    }

    /// Removes a server transaction.
    pub fn remove_server_transaction(&self, transaction_id: &str) -> Option<Transaction> {
        self.server_transactions.write().remove(transaction_id)
    }

    /// Removes a client transaction.
    pub fn remove_client_transaction(&self, transaction_id: &str) -> Option<Transaction> {
        self.client_transactions.write().remove(transaction_id)
    }

    /// Returns true if a live server transaction with this id exists.
    pub fn contains_server_transaction(&self, transaction_id: &str) -> bool {
        self.server_transactions.read().contains_key(transaction_id)
    }

    /// Returns true if a live client transaction with this id exists.
    pub fn contains_client_transaction(&self, transaction_id: &str) -> bool {
        self.client_transactions.read().contains_key(transaction_id)
    }

    /// Runs `f` against the named server transaction, if present.
    pub fn with_server_transaction<R>(
        &self,
        transaction_id: &str,
        f: impl FnOnce(&Transaction) -> R,
    ) -> Option<R> {
        self.server_transactions.read().get(transaction_id).map(f)
    }

    /// Runs `f` against the named server transaction mutably, if present.
    pub fn with_server_transaction_mut<R>(
        &self,
        transaction_id: &str,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> Option<R> {
        self.server_transactions
            .write()
            .get_mut(transaction_id)
            .map(f)
    }

    /// Runs `f` against the named client transaction, if present.
    pub fn with_client_transaction<R>(
        &self,
        transaction_id: &str,
        f: impl FnOnce(&Transaction) -> R,
    ) -> Option<R> {
        self.client_transactions.read().get(transaction_id).map(f)
    }

    /// Runs `f` against the named client transaction mutably, if present.
    pub fn with_client_transaction_mut<R>(
        &self,
        transaction_id: &str,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> Option<R> {
        self.client_transactions
            .write()
            .get_mut(transaction_id)
            .map(f)
    }

    /// Stores a channel handle and returns its id.
    pub fn insert_channel(&self, handle: ChannelHandle) -> ChannelId {
        let id = ChannelId(self.next_channel.fetch_add(1, Ordering::Relaxed));
        self.channels.write().insert(id, handle);
        id
    }

    /// Returns a copy of the named channel handle.
    pub fn channel(&self, id: ChannelId) -> Option<ChannelHandle> {
        self.channels.read().get(&id).cloned()
    }

    /// Drops a channel handle.
    pub fn remove_channel(&self, id: ChannelId) -> Option<ChannelHandle> {
        self.channels.write().remove(&id)
    }
}
