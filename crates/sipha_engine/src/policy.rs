//! Replication trigger decisions.
//!
//! Pure functions over protocol-state transitions. The manager feeds
//! them the configured strategy plus the event; they answer whether a
//! cache write is due *now*. They never touch the cache themselves.
//!
//! Replication is triggered when a response is recorded, not when the
//! raw dialog state is assigned: a state change and the response that
//! caused it arrive as one causally connected update, and triggering on
//! both would double-write the same logical change.

use crate::config::ReplicationStrategy;
use sipha_snapshot::{DialogState, TransactionState};

/// Returns true if recording a dialog response should trigger a write.
///
/// A retransmission carrying text identical to the last replicated
/// response is a no-op and never triggers a write.
pub fn dialog_write_due(
    strategy: ReplicationStrategy,
    state: DialogState,
    status: u16,
    response_text: &str,
    last_replicated: Option<&str>,
) -> bool {
    if !strategy.replicates_dialog_state(state) {
        return false;
    }
    if !strategy.replicates_response(status) {
        return false;
    }
    last_replicated != Some(response_text)
}

/// Returns true if a server transaction response should trigger a write.
///
/// A server transaction is replicated when it sends its first
/// provisional response to an INVITE; later responses belong to the
/// dialog's replication, not the transaction's.
pub fn server_transaction_write_due(
    strategy: ReplicationStrategy,
    method: &str,
    status: u16,
    already_replicated: bool,
) -> bool {
    strategy.replicates_transactions()
        && method.eq_ignore_ascii_case("INVITE")
        && (101..200).contains(&status)
        && !already_replicated
}

/// Returns true if a client transaction transition should trigger a
/// write.
///
/// A client INVITE transaction replicates on entering Trying or
/// Proceeding, but only once per improving status: a retransmitted
/// response at the same or a lower status must not write again.
pub fn client_transaction_write_due(
    strategy: ReplicationStrategy,
    method: &str,
    new_state: TransactionState,
    status: u16,
    replicated_status: Option<u16>,
) -> bool {
    if !strategy.replicates_transactions() || !method.eq_ignore_ascii_case("INVITE") {
        return false;
    }
    if !matches!(
        new_state,
        TransactionState::Trying | TransactionState::Proceeding
    ) {
        return false;
    }
    match replicated_status {
        None => true,
        Some(watermark) => status > watermark,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_strategy_ignores_early_dialog_responses() {
        assert!(!dialog_write_due(
            ReplicationStrategy::ConfirmedDialog,
            DialogState::Early,
            180,
            "SIP/2.0 180 Ringing",
            None,
        ));
    }

    #[test]
    fn confirmed_strategy_writes_on_final_response() {
        assert!(dialog_write_due(
            ReplicationStrategy::ConfirmedDialog,
            DialogState::Confirmed,
            200,
            "SIP/2.0 200 OK",
            None,
        ));
    }

    #[test]
    fn retransmission_does_not_rewrite() {
        let text = "SIP/2.0 200 OK";
        assert!(!dialog_write_due(
            ReplicationStrategy::ConfirmedDialog,
            DialogState::Confirmed,
            200,
            text,
            Some(text),
        ));
    }

    #[test]
    fn changed_response_text_writes_again() {
        assert!(dialog_write_due(
            ReplicationStrategy::EarlyDialog,
            DialogState::Early,
            183,
            "SIP/2.0 183 Session Progress",
            Some("SIP/2.0 180 Ringing"),
        ));
    }

    #[test]
    fn early_strategy_skips_terminated_dialogs() {
        assert!(!dialog_write_due(
            ReplicationStrategy::EarlyDialog,
            DialogState::Terminated,
            200,
            "SIP/2.0 200 OK",
            None,
        ));
    }

    #[test]
    fn early_strategy_skips_100_trying() {
        assert!(!dialog_write_due(
            ReplicationStrategy::EarlyDialog,
            DialogState::Early,
            100,
            "SIP/2.0 100 Trying",
            None,
        ));
    }

    #[test]
    fn server_transaction_first_provisional_invite_only() {
        let early = ReplicationStrategy::EarlyDialog;

        assert!(server_transaction_write_due(early, "INVITE", 180, false));
        // Second provisional: already replicated.
        assert!(!server_transaction_write_due(early, "INVITE", 183, true));
        // 100 Trying is hop-by-hop and not worth recovering.
        assert!(!server_transaction_write_due(early, "INVITE", 100, false));
        // Final responses belong to the dialog.
        assert!(!server_transaction_write_due(early, "INVITE", 200, false));
        // Non-INVITE transactions are not recovered.
        assert!(!server_transaction_write_due(early, "MESSAGE", 180, false));
    }

    #[test]
    fn server_transaction_needs_early_dialog_strategy() {
        assert!(!server_transaction_write_due(
            ReplicationStrategy::ConfirmedDialog,
            "INVITE",
            180,
            false,
        ));
        assert!(!server_transaction_write_due(
            ReplicationStrategy::ConfirmedDialogNoAppData,
            "INVITE",
            180,
            false,
        ));
    }

    #[test]
    fn client_transaction_improving_status_only() {
        let early = ReplicationStrategy::EarlyDialog;

        assert!(client_transaction_write_due(
            early,
            "INVITE",
            TransactionState::Trying,
            100,
            None,
        ));
        // Same status again: retransmission.
        assert!(!client_transaction_write_due(
            early,
            "INVITE",
            TransactionState::Proceeding,
            180,
            Some(180),
        ));
        // Lower status than the watermark: stale.
        assert!(!client_transaction_write_due(
            early,
            "INVITE",
            TransactionState::Proceeding,
            180,
            Some(183),
        ));
        // Improving status.
        assert!(client_transaction_write_due(
            early,
            "INVITE",
            TransactionState::Proceeding,
            183,
            Some(180),
        ));
    }

    #[test]
    fn client_transaction_gates_on_state_and_method() {
        let early = ReplicationStrategy::EarlyDialog;

        assert!(!client_transaction_write_due(
            early,
            "INVITE",
            TransactionState::Completed,
            200,
            Some(180),
        ));
        assert!(!client_transaction_write_due(
            early,
            "OPTIONS",
            TransactionState::Trying,
            100,
            None,
        ));
    }
}
