//! Merging stored snapshots into live entities.
//!
//! Two situations reach this code: recreation (a recovered node rebuilds
//! an entity it does not have) and reconciliation (a snapshot arrives
//! for an entity the node still holds, typically after a split). The
//! rules differ: recreation trusts the snapshot wholesale, while
//! reconciliation lets the higher version win and never regresses a
//! sequence number.

use crate::dialog::Dialog;
use crate::transaction::Transaction;
use sipha_snapshot::{DialogSnapshot, TransactionSnapshot};
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

/// What a snapshot application actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The entity was rebuilt from scratch; every stored field applied.
    Recreated,
    /// The snapshot was newer and its fields were merged in.
    Applied,
    /// The snapshot was not newer than the live entity; nothing changed.
    StaleDiscarded,
}

/// Merges a dialog snapshot into a live dialog.
///
/// On recreation every present field is applied, and when the snapshot
/// records the server role the party addresses and sequence numbers are
/// swapped: the stored form is written from the original server's point
/// of view, and the node taking the call over must see the same dialog
/// from the opposite direction.
///
/// Outside recreation the snapshot only applies if its version is
/// strictly higher than the live one. Sequence numbers never regress in
/// either mode.
pub fn apply_dialog_snapshot(
    dialog: &mut Dialog,
    snapshot: &DialogSnapshot,
    recreation: bool,
) -> ApplyOutcome {
    if !recreation && snapshot.version <= dialog.version() {
        debug!(
            dialog_id = %snapshot.dialog_id,
            live_version = dialog.version(),
            snapshot_version = snapshot.version,
            "discarding stale dialog snapshot"
        );
        return ApplyOutcome::StaleDiscarded;
    }

    let swap_roles = recreation && snapshot.is_server == Some(true);
    let (snap_local_cseq, snap_remote_cseq) = if swap_roles {
        (snapshot.remote_cseq, snapshot.local_cseq)
    } else {
        (snapshot.local_cseq, snapshot.remote_cseq)
    };

    apply_cseq(
        &mut dialog.local_cseq,
        snap_local_cseq,
        &snapshot.dialog_id,
        "local",
        recreation,
    );
    apply_cseq(
        &mut dialog.remote_cseq,
        snap_remote_cseq,
        &snapshot.dialog_id,
        "remote",
        recreation,
    );

    if let Some(v) = &snapshot.last_response {
        dialog.last_response = Some(v.clone());
    }
    if let Some(v) = &snapshot.local_tag {
        dialog.local_tag = Some(v.clone());
    }
    if let Some(v) = &snapshot.remote_tag {
        dialog.remote_tag = Some(v.clone());
    }
    if let Some(v) = snapshot.state {
        dialog.state = v;
    }
    if let Some(v) = &snapshot.method {
        dialog.method = v.clone();
    }
    if let Some(v) = snapshot.is_server {
        dialog.is_server = v;
    }

    let (snap_local_party, snap_remote_party) = if swap_roles {
        (&snapshot.remote_party, &snapshot.local_party)
    } else {
        (&snapshot.local_party, &snapshot.remote_party)
    };
    if let Some(v) = snap_local_party {
        dialog.local_party = Some(v.clone());
    }
    if let Some(v) = snap_remote_party {
        dialog.remote_party = Some(v.clone());
    }

    if let Some(v) = &snapshot.route_set {
        dialog.route_set = v.clone();
    }
    if let Some(v) = &snapshot.remote_target {
        dialog.remote_target = Some(v.clone());
    }
    if let Some(v) = &snapshot.contact_header {
        dialog.contact_header = Some(v.clone());
    }
    if let Some(v) = &snapshot.event_header {
        dialog.event_header = Some(v.clone());
    }
    if let Some(v) = snapshot.is_b2bua {
        dialog.is_b2bua = v;
    }
    if let Some(v) = snapshot.terminate_on_bye {
        dialog.terminate_on_bye = v;
    }
    if let Some(v) = snapshot.cseq_validation {
        dialog.cseq_validation = v;
    }
    if let Some(v) = snapshot.is_reinvite {
        dialog.is_reinvite = v;
    }
    if let Some(v) = &snapshot.first_transaction {
        dialog.first_transaction = Some(v.clone());
    }
    if let Some(v) = &snapshot.application_data {
        dialog.application_data = Some(v.clone());
    }

    dialog.version.store(snapshot.version, Ordering::SeqCst);
    // Reconciled state is already in the cache; nothing here is dirty.
    dialog.dirty.clear();

    if recreation {
        ApplyOutcome::Recreated
    } else {
        ApplyOutcome::Applied
    }
}

fn apply_cseq(live: &mut u64, stored: u64, dialog_id: &str, which: &str, recreation: bool) {
    if stored < *live {
        warn!(
            %dialog_id,
            which,
            live_cseq = *live,
            stored_cseq = stored,
            recreation,
            "stored CSeq is behind the live one, nodes out of sync; keeping the local value"
        );
        return;
    }
    *live = stored;
}

/// Merges a transaction snapshot into a live transaction.
///
/// Transactions carry no per-field deltas; a newer snapshot replaces the
/// mutable parts of the record outright.
pub fn apply_transaction_snapshot(
    transaction: &mut Transaction,
    snapshot: &TransactionSnapshot,
    recreation: bool,
) -> ApplyOutcome {
    if !recreation && snapshot.version <= transaction.version {
        debug!(
            transaction_id = %snapshot.transaction_id,
            live_version = transaction.version,
            snapshot_version = snapshot.version,
            "discarding stale transaction snapshot"
        );
        return ApplyOutcome::StaleDiscarded;
    }

    transaction.kind = snapshot.kind;
    transaction.state = snapshot.state;
    transaction.original_request = snapshot.original_request.clone();
    if let Some(dialog_id) = &snapshot.dialog_id {
        transaction.dialog_id = Some(dialog_id.clone());
    }
    transaction.transport = snapshot.transport.clone();
    transaction.peer_address = snapshot.peer_address.clone();
    transaction.peer_port = snapshot.peer_port;
    transaction.local_port = snapshot.local_port;
    transaction.version = snapshot.version;

    if recreation {
        ApplyOutcome::Recreated
    } else {
        ApplyOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipha_snapshot::{DialogState, TransactionKind, TransactionState};

    fn snapshot_v(version: u64) -> DialogSnapshot {
        let mut snapshot = DialogSnapshot::new("d1", version, 5, 9);
        snapshot.local_tag = Some("t1".into());
        snapshot.remote_tag = Some("t2".into());
        snapshot.state = Some(DialogState::Confirmed);
        snapshot
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let mut dialog = Dialog::new("d1", "INVITE", true);
        dialog.version.store(7, Ordering::SeqCst);
        dialog.set_local_cseq(50);

        let outcome = apply_dialog_snapshot(&mut dialog, &snapshot_v(7), false);
        assert_eq!(outcome, ApplyOutcome::StaleDiscarded);
        assert_eq!(dialog.local_cseq(), 50);
        assert_eq!(dialog.version(), 7);
    }

    #[test]
    fn newer_snapshot_applies() {
        let mut dialog = Dialog::new("d1", "INVITE", true);
        dialog.version.store(3, Ordering::SeqCst);

        let outcome = apply_dialog_snapshot(&mut dialog, &snapshot_v(4), false);
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(dialog.version(), 4);
        assert_eq!(dialog.state(), DialogState::Confirmed);
        assert_eq!(dialog.local_tag(), Some("t1"));
        assert_eq!(dialog.local_cseq(), 5);
    }

    #[test]
    fn recreation_ignores_version_ordering() {
        let mut dialog = Dialog::new("d1", "INVITE", false);
        dialog.version.store(10, Ordering::SeqCst);

        let outcome = apply_dialog_snapshot(&mut dialog, &snapshot_v(2), true);
        assert_eq!(outcome, ApplyOutcome::Recreated);
        assert_eq!(dialog.version(), 2);
    }

    #[test]
    fn cseq_never_regresses() {
        let mut dialog = Dialog::new("d1", "INVITE", true);
        dialog.version.store(1, Ordering::SeqCst);
        dialog.set_local_cseq(100);
        dialog.set_remote_cseq(3);

        // Snapshot is newer by version but carries an older local CSeq.
        let outcome = apply_dialog_snapshot(&mut dialog, &snapshot_v(4), false);
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(dialog.local_cseq(), 100);
        assert_eq!(dialog.remote_cseq(), 9);
    }

    #[test]
    fn recreation_with_server_role_swaps_direction() {
        let mut dialog = Dialog::new("d1", "INVITE", false);

        let mut snapshot = snapshot_v(4);
        snapshot.is_server = Some(true);
        snapshot.local_party = Some("<sip:bob@b>".into());
        snapshot.remote_party = Some("<sip:alice@a>".into());

        let outcome = apply_dialog_snapshot(&mut dialog, &snapshot, true);
        assert_eq!(outcome, ApplyOutcome::Recreated);
        assert_eq!(dialog.local_party(), Some("<sip:alice@a>"));
        assert_eq!(dialog.remote_party(), Some("<sip:bob@b>"));
        assert_eq!(dialog.local_cseq(), 9);
        assert_eq!(dialog.remote_cseq(), 5);
        assert!(dialog.is_server());
    }

    #[test]
    fn client_role_recreation_keeps_direction() {
        let mut dialog = Dialog::new("d1", "INVITE", false);

        let mut snapshot = snapshot_v(4);
        snapshot.is_server = Some(false);
        snapshot.local_party = Some("<sip:alice@a>".into());
        snapshot.remote_party = Some("<sip:bob@b>".into());

        apply_dialog_snapshot(&mut dialog, &snapshot, true);
        assert_eq!(dialog.local_party(), Some("<sip:alice@a>"));
        assert_eq!(dialog.local_cseq(), 5);
        assert_eq!(dialog.remote_cseq(), 9);
    }

    #[test]
    fn absent_fields_do_not_clear_live_state() {
        let mut dialog = Dialog::new("d1", "INVITE", true);
        dialog.set_contact_header("<sip:bob@host>");
        dialog.set_route_set(vec!["<sip:p1;lr>".into()]);
        dialog.version.store(1, Ordering::SeqCst);

        // Sparse snapshot: no contact, no route set.
        apply_dialog_snapshot(&mut dialog, &snapshot_v(2), false);
        assert_eq!(dialog.contact_header.as_deref(), Some("<sip:bob@host>"));
        assert_eq!(dialog.route_set().len(), 1);
    }

    #[test]
    fn transaction_snapshot_applies_by_version() {
        let mut tx = Transaction::new(
            "b1",
            TransactionKind::Client,
            "INVITE sip:b@h SIP/2.0\r\n\r\n",
            "udp",
            "192.0.2.1",
            5060,
            5080,
        );
        tx.version = 2;

        let snapshot = TransactionSnapshot {
            transaction_id: "b1".into(),
            kind: TransactionKind::Client,
            version: 3,
            original_request: "INVITE sip:b@h SIP/2.0\r\n\r\n".into(),
            dialog_id: Some("d1".into()),
            state: TransactionState::Proceeding,
            transport: "udp".into(),
            peer_address: "192.0.2.1".into(),
            peer_port: 5060,
            local_port: 5080,
        };

        assert_eq!(
            apply_transaction_snapshot(&mut tx, &snapshot, false),
            ApplyOutcome::Applied
        );
        assert_eq!(tx.state(), TransactionState::Proceeding);
        assert_eq!(tx.dialog_id(), Some("d1"));

        let mut stale = snapshot;
        stale.version = 3;
        assert_eq!(
            apply_transaction_snapshot(&mut tx, &stale, false),
            ApplyOutcome::StaleDiscarded
        );
    }
}
