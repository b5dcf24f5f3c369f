//! The replication manager, the engine's single entry point.
//!
//! The surrounding stack reports protocol events here (responses
//! recorded, transaction transitions, terminations); the manager
//! consults the policy, builds snapshots, and drives the cache adapter.
//! Recovery after a failover also starts here.
//!
//! Cache write failures are logged and swallowed: call processing never
//! stalls because replication is degraded. The explicit recovery reads
//! are the one place where cache unavailability propagates to the
//! caller.

use crate::arena::EntityArena;
use crate::config::ReplicationConfig;
use crate::dialog::Dialog;
use crate::error::{HaError, HaResult};
use crate::policy;
use crate::reconcile::{self, ApplyOutcome};
use crate::reconstruct;
use crate::transaction::Transaction;
use crate::transport::ProcessorRegistry;
use sipha_cache::{RemovedEntity, SipEntityCache};
use sipha_snapshot::{
    DialogField, DialogSnapshot, DirtyFields, TransactionSnapshot, TransactionState,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Coordinates replication and recovery for one node.
///
/// All dependencies are handed in at construction; the manager holds no
/// global state and a process may run several managers against separate
/// caches.
pub struct ReplicationManager {
    config: ReplicationConfig,
    cache: Arc<dyn SipEntityCache>,
    arena: Arc<EntityArena>,
    processors: ProcessorRegistry,
}

impl ReplicationManager {
    /// Creates a manager over the given cache, arena, and listening
    /// points.
    pub fn new(
        config: ReplicationConfig,
        cache: Arc<dyn SipEntityCache>,
        arena: Arc<EntityArena>,
        processors: ProcessorRegistry,
    ) -> Self {
        Self {
            config,
            cache,
            arena,
            processors,
        }
    }

    /// Returns the arena of live entities.
    pub fn arena(&self) -> &Arc<EntityArena> {
        &self.arena
    }

    /// Returns the listening-point registry.
    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Adopts a freshly created dialog into the live table.
    pub fn track_dialog(&self, dialog: Dialog) {
        self.arena.insert_dialog(dialog);
    }

    /// Adopts a freshly created server transaction into the live table.
    pub fn track_server_transaction(&self, transaction: Transaction) {
        self.arena.insert_server_transaction(transaction);
    }

    /// Adopts a freshly created client transaction into the live table.
    pub fn track_client_transaction(&self, transaction: Transaction) {
        self.arena.insert_client_transaction(transaction);
    }

    /// Records a response on a dialog and replicates if the policy says
    /// the write is due.
    ///
    /// Returns `Ok(true)` when a snapshot reached the cache, `Ok(false)`
    /// when the write was suppressed or failed.
    ///
    /// # Errors
    ///
    /// [`HaError::DialogNotFound`] if no live dialog has this id.
    pub fn on_dialog_response(
        &self,
        dialog_id: &str,
        status: u16,
        response_text: &str,
    ) -> HaResult<bool> {
        let local = self.cache.in_local_mode();
        let strategy = self.config.strategy;
        let app_data = self.config.application_data_enabled();

        let prepared = self
            .arena
            .with_dialog_mut(dialog_id, |dialog| {
                dialog.set_last_response(response_text);
                if local {
                    return None;
                }
                let due = policy::dialog_write_due(
                    strategy,
                    dialog.state(),
                    status,
                    response_text,
                    dialog.last_replicated_response.as_deref(),
                );
                if !due {
                    return None;
                }
                let pending = dialog.dirty.clone();
                let mut snapshot = dialog.build_snapshot();
                if !app_data {
                    snapshot.application_data = None;
                }
                Some((snapshot, !dialog.replicated, pending))
            })
            .ok_or_else(|| HaError::DialogNotFound {
                dialog_id: dialog_id.to_string(),
            })?;

        let Some((snapshot, first_write, pending)) = prepared else {
            return Ok(false);
        };

        if self.dialog_write_superseded(&snapshot) {
            self.restore_pending_dialog_fields(dialog_id, pending);
            return Ok(false);
        }

        let result = if first_write {
            self.cache.put_dialog(&snapshot)
        } else {
            self.cache.update_dialog(dialog_id, &snapshot)
        };
        match result {
            Ok(()) => {
                self.arena.with_dialog_mut(dialog_id, |dialog| {
                    dialog.replicated = true;
                    dialog.last_replicated_response = Some(response_text.to_string());
                });
                Ok(true)
            }
            Err(e) => {
                warn!(
                    %dialog_id,
                    error = %e,
                    "dialog replication write failed, call processing continues unreplicated"
                );
                self.restore_pending_dialog_fields(dialog_id, pending);
                Ok(false)
            }
        }
    }

    /// Sets a dialog's application payload, replicating it on its own
    /// when application data is enabled and the dialog already lives in
    /// the cache.
    ///
    /// "On its own" means no protocol event is needed to carry the
    /// payload out. It still waits for the dialog's first due write: a
    /// payload set on a dialog the cache has never seen, or whose state
    /// the strategy does not replicate yet, stays marked dirty and rides
    /// along with that write instead of forcing one.
    ///
    /// # Errors
    ///
    /// [`HaError::DialogNotFound`] if no live dialog has this id.
    pub fn set_application_data(&self, dialog_id: &str, data: &str) -> HaResult<bool> {
        let local = self.cache.in_local_mode();
        let enabled = self.config.application_data_enabled();
        let strategy = self.config.strategy;

        let prepared = self
            .arena
            .with_dialog_mut(dialog_id, |dialog| {
                if !enabled {
                    // Keep the payload locally but never let it travel.
                    dialog.application_data = Some(data.to_string());
                    return None;
                }
                dialog.set_application_data(data);
                if local || !dialog.replicated || !strategy.replicates_dialog_state(dialog.state())
                {
                    // The dirty bit stays set; the payload rides along
                    // with the next due write.
                    return None;
                }
                let pending = dialog.dirty.clone();
                Some((dialog.build_snapshot(), pending))
            })
            .ok_or_else(|| HaError::DialogNotFound {
                dialog_id: dialog_id.to_string(),
            })?;

        let Some((snapshot, pending)) = prepared else {
            return Ok(false);
        };
        if self.dialog_write_superseded(&snapshot) {
            self.restore_pending_dialog_fields(dialog_id, pending);
            return Ok(false);
        }
        match self.cache.update_dialog(dialog_id, &snapshot) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(%dialog_id, error = %e, "application data replication failed");
                self.restore_pending_dialog_fields(dialog_id, pending);
                Ok(false)
            }
        }
    }

    /// Reports a response sent by a server transaction.
    ///
    /// # Errors
    ///
    /// [`HaError::TransactionNotFound`] if no live server transaction
    /// has this id.
    pub fn on_server_transaction_response(
        &self,
        transaction_id: &str,
        status: u16,
    ) -> HaResult<bool> {
        let local = self.cache.in_local_mode();
        let strategy = self.config.strategy;

        let prepared = self
            .arena
            .with_server_transaction_mut(transaction_id, |tx| {
                if local {
                    return None;
                }
                let due = policy::server_transaction_write_due(
                    strategy,
                    tx.method(),
                    status,
                    tx.replicated,
                );
                if !due {
                    return None;
                }
                Some((tx.build_snapshot(), !tx.replicated))
            })
            .ok_or_else(|| HaError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })?;

        let Some((snapshot, first_write)) = prepared else {
            return Ok(false);
        };

        let result = if first_write {
            self.cache.put_server_transaction(&snapshot)
        } else {
            self.cache.update_server_transaction(transaction_id, &snapshot)
        };
        match result {
            Ok(()) => {
                self.arena.with_server_transaction_mut(transaction_id, |tx| {
                    tx.replicated = true;
                    tx.replicated_status = Some(status);
                });
                Ok(true)
            }
            Err(e) => {
                warn!(%transaction_id, error = %e, "server transaction replication failed");
                Ok(false)
            }
        }
    }

    /// Reports a client transaction state transition driven by a
    /// received response.
    ///
    /// # Errors
    ///
    /// [`HaError::TransactionNotFound`] if no live client transaction
    /// has this id.
    pub fn on_client_transaction_state(
        &self,
        transaction_id: &str,
        new_state: TransactionState,
        status: u16,
    ) -> HaResult<bool> {
        let local = self.cache.in_local_mode();
        let strategy = self.config.strategy;

        let prepared = self
            .arena
            .with_client_transaction_mut(transaction_id, |tx| {
                tx.set_state(new_state);
                if local {
                    return None;
                }
                let due = policy::client_transaction_write_due(
                    strategy,
                    tx.method(),
                    new_state,
                    status,
                    tx.replicated_status,
                );
                if !due {
                    return None;
                }
                Some((tx.build_snapshot(), !tx.replicated))
            })
            .ok_or_else(|| HaError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })?;

        let Some((snapshot, first_write)) = prepared else {
            return Ok(false);
        };

        let result = if first_write {
            self.cache.put_client_transaction(&snapshot)
        } else {
            self.cache.update_client_transaction(transaction_id, &snapshot)
        };
        match result {
            Ok(()) => {
                self.arena.with_client_transaction_mut(transaction_id, |tx| {
                    tx.replicated = true;
                    tx.replicated_status = Some(status);
                });
                Ok(true)
            }
            Err(e) => {
                warn!(%transaction_id, error = %e, "client transaction replication failed");
                Ok(false)
            }
        }
    }

    /// Tears down a dialog: the live entity, its channel, and its cache
    /// record all go.
    pub fn on_dialog_terminated(&self, dialog_id: &str) {
        if let Some(dialog) = self.arena.remove_dialog(dialog_id) {
            if let Some(channel) = dialog.channel() {
                self.arena.remove_channel(channel);
            }
        }
        if !self.cache.in_local_mode() {
            self.cache.remove_dialog(dialog_id);
        }
        debug!(%dialog_id, "dialog terminated");
    }

    /// Tears down a server transaction.
    pub fn on_server_transaction_terminated(&self, transaction_id: &str) {
        let replicated = self
            .arena
            .remove_server_transaction(transaction_id)
            .map(|tx| {
                if let Some(channel) = tx.channel() {
                    self.arena.remove_channel(channel);
                }
                tx.replicated
            })
            .unwrap_or(true);
        if replicated && !self.cache.in_local_mode() {
            self.cache.remove_server_transaction(transaction_id);
        }
    }

    /// Tears down a client transaction.
    pub fn on_client_transaction_terminated(&self, transaction_id: &str) {
        let replicated = self
            .arena
            .remove_client_transaction(transaction_id)
            .map(|tx| {
                if let Some(channel) = tx.channel() {
                    self.arena.remove_channel(channel);
                }
                tx.replicated
            })
            .unwrap_or(true);
        if replicated && !self.cache.in_local_mode() {
            self.cache.remove_client_transaction(transaction_id);
        }
    }

    /// Drops the hot copy of a dialog under memory pressure.
    ///
    /// The live entity goes away and the cache keeps only its durable
    /// copy; a later in-dialog request recovers it like a failover
    /// would.
    pub fn evict_dialog(&self, dialog_id: &str) {
        if let Some(dialog) = self.arena.remove_dialog(dialog_id) {
            if let Some(channel) = dialog.channel() {
                self.arena.remove_channel(channel);
            }
        }
        if !self.cache.in_local_mode() {
            self.cache.evict_dialog(dialog_id);
        }
        debug!(%dialog_id, "dialog evicted");
    }

    /// Handles a removal performed by another node.
    ///
    /// Purges the local live entity only. The record is already gone
    /// from the cache; echoing a remove back would ping-pong deletions
    /// around the cluster.
    pub fn on_remote_entity_removed(&self, removed: &RemovedEntity) {
        use sipha_cache::EntityKind;

        let channel = match removed.kind {
            EntityKind::Dialog => self
                .arena
                .remove_dialog(&removed.entity_id)
                .and_then(|d| d.channel()),
            EntityKind::ServerTransaction => self
                .arena
                .remove_server_transaction(&removed.entity_id)
                .and_then(|t| t.channel()),
            EntityKind::ClientTransaction => self
                .arena
                .remove_client_transaction(&removed.entity_id)
                .and_then(|t| t.channel()),
        };
        if let Some(channel) = channel {
            self.arena.remove_channel(channel);
        }
        info!(
            entity_id = %removed.entity_id,
            kind = ?removed.kind,
            "purged entity removed by another node"
        );
    }

    /// Recovers a dialog from the cache.
    ///
    /// Returns `Ok(true)` when the live table changed: either the dialog
    /// was rebuilt, or a newer stored snapshot was merged into a live
    /// one. `Ok(false)` means no record, a stale record, local mode, or
    /// an unrecoverable (malformed) record.
    ///
    /// # Errors
    ///
    /// Cache unavailability, a missing listening point, and channel
    /// failures all propagate; the failover driver decides what to do
    /// next.
    pub fn recover_dialog(&self, dialog_id: &str) -> HaResult<bool> {
        if self.cache.in_local_mode() {
            return Ok(false);
        }
        let Some(snapshot) = self.cache.get_dialog(dialog_id)? else {
            return Ok(false);
        };

        if self.arena.contains_dialog(dialog_id) {
            let outcome = self
                .arena
                .with_dialog_mut(dialog_id, |dialog| {
                    reconcile::apply_dialog_snapshot(dialog, &snapshot, false)
                });
            return Ok(outcome == Some(ApplyOutcome::Applied));
        }

        match reconstruct::rebuild_dialog(&self.processors, &snapshot) {
            Ok(dialog) => {
                self.arena.insert_dialog(dialog);
                Ok(true)
            }
            Err(HaError::MalformedSnapshot { entity_id, reason }) => {
                error!(%entity_id, %reason, "dialog snapshot unrecoverable, treating as not found");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Recovers a server transaction from the cache.
    ///
    /// # Errors
    ///
    /// Same contract as [`ReplicationManager::recover_dialog`].
    pub fn recover_server_transaction(&self, transaction_id: &str) -> HaResult<bool> {
        if self.cache.in_local_mode() {
            return Ok(false);
        }
        let Some(snapshot) = self.cache.get_server_transaction(transaction_id)? else {
            return Ok(false);
        };

        if self.arena.contains_server_transaction(transaction_id) {
            let outcome = self.arena.with_server_transaction_mut(transaction_id, |tx| {
                reconcile::apply_transaction_snapshot(tx, &snapshot, false)
            });
            return Ok(outcome == Some(ApplyOutcome::Applied));
        }

        self.rebuild_and_insert_transaction(&snapshot, |arena, tx| {
            arena.insert_server_transaction(tx);
        })
    }

    /// Recovers a client transaction from the cache.
    ///
    /// # Errors
    ///
    /// Same contract as [`ReplicationManager::recover_dialog`].
    pub fn recover_client_transaction(&self, transaction_id: &str) -> HaResult<bool> {
        if self.cache.in_local_mode() {
            return Ok(false);
        }
        let Some(snapshot) = self.cache.get_client_transaction(transaction_id)? else {
            return Ok(false);
        };

        if self.arena.contains_client_transaction(transaction_id) {
            let outcome = self.arena.with_client_transaction_mut(transaction_id, |tx| {
                reconcile::apply_transaction_snapshot(tx, &snapshot, false)
            });
            return Ok(outcome == Some(ApplyOutcome::Applied));
        }

        self.rebuild_and_insert_transaction(&snapshot, |arena, tx| {
            arena.insert_client_transaction(tx);
        })
    }

    fn rebuild_and_insert_transaction(
        &self,
        snapshot: &TransactionSnapshot,
        insert: impl FnOnce(&EntityArena, Transaction),
    ) -> HaResult<bool> {
        match reconstruct::rebuild_transaction(&self.processors, &self.arena, snapshot) {
            Ok(transaction) => {
                insert(&self.arena, transaction);
                Ok(true)
            }
            Err(HaError::MalformedSnapshot { entity_id, reason }) => {
                error!(
                    %entity_id,
                    %reason,
                    "transaction snapshot unrecoverable, treating as not found"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Puts a dialog's consumed dirty tracker back after a built
    /// snapshot never reached the cache.
    ///
    /// Without this, a transient write failure would eat the one-time
    /// fields (method, role, parties, first-transaction descriptor) and
    /// any cold dirty bits, and no later snapshot would ever carry them
    /// again. The version counter is left alone; versions may skip a
    /// number.
    fn restore_pending_dialog_fields(
        &self,
        dialog_id: &str,
        pending: DirtyFields<DialogField>,
    ) {
        self.arena.with_dialog_mut(dialog_id, |dialog| {
            dialog.dirty = pending;
        });
    }

    /// Returns true when the cache already holds a snapshot at or past
    /// this version, meaning another node wrote in the meantime.
    fn dialog_write_superseded(&self, snapshot: &DialogSnapshot) -> bool {
        match self.cache.get_dialog(&snapshot.dialog_id) {
            Ok(Some(stored)) if stored.version >= snapshot.version => {
                debug!(
                    dialog_id = %snapshot.dialog_id,
                    stored_version = stored.version,
                    local_version = snapshot.version,
                    "skipping write, cache already holds a newer snapshot"
                );
                true
            }
            // Missing record, older record, or a read failure: attempt
            // the write and let it speak for itself.
            _ => false,
        }
    }
}
