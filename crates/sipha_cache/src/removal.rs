//! Remote-removal feed.
//!
//! A distributed backend can observe a record being deleted by *another*
//! node. The engine needs to purge its live copy in response, and must do
//! so without issuing a removal write of its own (which would echo around
//! the cluster forever). The feed carries those notifications; it never
//! carries deletions performed by this node.

use crate::adapter::EntityKind;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// A single remote-removal notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEntity {
    /// Kind of the removed record.
    pub kind: EntityKind,
    /// Id of the removed record.
    pub entity_id: String,
}

impl RemovedEntity {
    /// Creates a notification for a removed dialog.
    pub fn dialog(entity_id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Dialog,
            entity_id: entity_id.into(),
        }
    }

    /// Creates a notification for a removed server transaction.
    pub fn server_transaction(entity_id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::ServerTransaction,
            entity_id: entity_id.into(),
        }
    }

    /// Creates a notification for a removed client transaction.
    pub fn client_transaction(entity_id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::ClientTransaction,
            entity_id: entity_id.into(),
        }
    }
}

/// Distributes remote-removal notifications to subscribers.
///
/// Thread-safe; supports multiple subscribers and cleans up
/// disconnected ones on emit.
#[derive(Debug, Default)]
pub struct RemovalFeed {
    subscribers: RwLock<Vec<Sender<RemovedEntity>>>,
}

impl RemovalFeed {
    /// Creates a new feed with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver that observes all future notifications.
    pub fn subscribe(&self) -> Receiver<RemovedEntity> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits a notification to all subscribers.
    pub fn emit(&self, removed: RemovedEntity) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(removed.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
