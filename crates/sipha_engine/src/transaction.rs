//! Live transaction state and snapshot builds.

use crate::transport::ChannelId;
use sipha_snapshot::{TransactionKind, TransactionSnapshot, TransactionState};

/// A live transaction owned by this node's stack.
///
/// Much smaller than a dialog: a transaction snapshot always carries the
/// full record, so there is no per-field dirty tracking, just a version
/// counter bumped on each build.
#[derive(Debug)]
pub struct Transaction {
    pub(crate) id: String,
    pub(crate) kind: TransactionKind,
    pub(crate) version: u64,
    pub(crate) original_request: String,
    pub(crate) dialog_id: Option<String>,
    pub(crate) state: TransactionState,
    pub(crate) transport: String,
    pub(crate) peer_address: String,
    pub(crate) peer_port: u16,
    pub(crate) local_port: u16,
    pub(crate) channel: Option<ChannelId>,
    /// Highest response status already replicated, if any.
    pub(crate) replicated_status: Option<u16>,
    /// Whether this transaction has ever been written to the cache.
    pub(crate) replicated: bool,
}

impl Transaction {
    /// Creates a transaction from its wire-level identity.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        kind: TransactionKind,
        original_request: impl Into<String>,
        transport: impl Into<String>,
        peer_address: impl Into<String>,
        peer_port: u16,
        local_port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            version: 0,
            original_request: original_request.into(),
            dialog_id: None,
            state: TransactionState::Trying,
            transport: transport.into(),
            peer_address: peer_address.into(),
            peer_port,
            local_port,
            channel: None,
            replicated_status: None,
            replicated: false,
        }
    }

    /// Returns the transaction id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the client/server side.
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Returns the current version counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the canonical text of the original request.
    pub fn original_request(&self) -> &str {
        &self.original_request
    }

    /// Returns the request method, read off the request line.
    pub fn method(&self) -> &str {
        self.original_request
            .split_whitespace()
            .next()
            .unwrap_or("")
    }

    /// Returns the associated dialog id, when known.
    pub fn dialog_id(&self) -> Option<&str> {
        self.dialog_id.as_deref()
    }

    /// Returns the transport name.
    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// Returns the bound transport channel id, when any.
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Sets the transaction state.
    pub fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    /// Associates the transaction with a dialog discovered after the
    /// transaction was created.
    pub fn attach_dialog(&mut self, dialog_id: impl Into<String>) {
        self.dialog_id = Some(dialog_id.into());
    }

    /// Binds the transaction to a transport channel.
    pub fn bind_channel(&mut self, channel: ChannelId) {
        self.channel = Some(channel);
    }

    /// Builds the next snapshot, bumping the version counter once.
    pub fn build_snapshot(&mut self) -> TransactionSnapshot {
        self.version += 1;
        TransactionSnapshot {
            transaction_id: self.id.clone(),
            kind: self.kind,
            version: self.version,
            original_request: self.original_request.clone(),
            dialog_id: self.dialog_id.clone(),
            state: self.state,
            transport: self.transport.clone(),
            peer_address: self.peer_address.clone(),
            peer_port: self.peer_port,
            local_port: self.local_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_invite() -> Transaction {
        Transaction::new(
            "z9hG4bK-1",
            TransactionKind::Server,
            "INVITE sip:bob@example.com SIP/2.0\r\n\r\n",
            "udp",
            "192.0.2.15",
            5060,
            5080,
        )
    }

    #[test]
    fn snapshot_carries_full_record() {
        let mut tx = server_invite();
        tx.set_state(TransactionState::Proceeding);

        let snapshot = tx.build_snapshot();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.state, TransactionState::Proceeding);
        assert_eq!(snapshot.transport, "udp");
        assert_eq!(snapshot.peer_port, 5060);
        assert_eq!(snapshot.dialog_id, None);
    }

    #[test]
    fn version_increments_once_per_build() {
        let mut tx = server_invite();
        assert_eq!(tx.build_snapshot().version, 1);
        assert_eq!(tx.build_snapshot().version, 2);
        assert_eq!(tx.version(), 2);
    }

    #[test]
    fn method_comes_from_the_request_line() {
        assert_eq!(server_invite().method(), "INVITE");
    }

    #[test]
    fn late_dialog_attachment_shows_in_next_snapshot() {
        let mut tx = server_invite();
        let _ = tx.build_snapshot();

        tx.attach_dialog("call-1@host|t1|t2");
        let snapshot = tx.build_snapshot();
        assert_eq!(snapshot.dialog_id.as_deref(), Some("call-1@host|t1|t2"));
    }
}
