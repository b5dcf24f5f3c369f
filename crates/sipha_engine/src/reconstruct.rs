//! Rebuilding live entities from stored snapshots.
//!
//! Runs on the node taking over after a failure. Stored message text is
//! re-parsed at this boundary; a snapshot whose messages no longer parse
//! marks that one entity unrecoverable and touches nothing else.

use crate::arena::EntityArena;
use crate::dialog::Dialog;
use crate::error::{HaError, HaResult};
use crate::reconcile::{self, ApplyOutcome};
use crate::transaction::Transaction;
use crate::transport::ProcessorRegistry;
use sipha_snapshot::{DialogSnapshot, TransactionSnapshot};
use tracing::info;

/// Rebuilds a dialog from its snapshot.
///
/// The last response must be present and parse as a SIP response; it is
/// what the recovered dialog retransmits and what mid-dialog requests
/// are validated against. When the snapshot records its creating
/// transaction, a listening point matching that transaction's port and
/// security must exist on this node.
///
/// # Errors
///
/// [`HaError::MalformedSnapshot`] if the stored response is absent or
/// unparseable, [`HaError::NoMatchingTransport`] if no listening point
/// can serve the dialog.
pub fn rebuild_dialog(
    registry: &ProcessorRegistry,
    snapshot: &DialogSnapshot,
) -> HaResult<Dialog> {
    let response_text = snapshot.last_response.as_deref().ok_or_else(|| {
        HaError::malformed(&snapshot.dialog_id, "snapshot carries no last response")
    })?;
    parse_response(&snapshot.dialog_id, response_text)?;

    if let Some(ft) = &snapshot.first_transaction {
        if registry.find_listening(ft.port, ft.secure).is_none() {
            let label = if ft.secure { "secure" } else { "insecure" };
            return Err(HaError::NoMatchingTransport {
                entity_id: snapshot.dialog_id.clone(),
                transport: format!("{label} port {}", ft.port),
            });
        }
    }

    let method = snapshot.method.as_deref().unwrap_or("INVITE");
    let is_server = snapshot.is_server.unwrap_or(false);
    let mut dialog = Dialog::new(snapshot.dialog_id.clone(), method, is_server);
    let outcome = reconcile::apply_dialog_snapshot(&mut dialog, snapshot, true);
    debug_assert_eq!(outcome, ApplyOutcome::Recreated);

    // The rebuilt entity is already the cache's view of the world; its
    // first local change must not re-send the one-time fields.
    let _ = dialog.dirty.take_first_snapshot();
    dialog.replicated = true;
    dialog.last_replicated_response = snapshot.last_response.clone();

    info!(
        dialog_id = %snapshot.dialog_id,
        version = snapshot.version,
        is_server,
        "rebuilt dialog from stored snapshot"
    );
    Ok(dialog)
}

/// Rebuilds a transaction from its snapshot.
///
/// Locates the listening point recorded in the snapshot, opens a channel
/// back to the peer, and re-parses the original request.
///
/// # Errors
///
/// [`HaError::NoMatchingTransport`] if no local listening point serves
/// the recorded transport and port, [`HaError::ChannelCreation`] if the
/// channel toward the peer cannot be opened, and
/// [`HaError::MalformedSnapshot`] if the stored request is unparseable.
pub fn rebuild_transaction(
    registry: &ProcessorRegistry,
    arena: &EntityArena,
    snapshot: &TransactionSnapshot,
) -> HaResult<Transaction> {
    let processor = registry
        .find(&snapshot.transport, snapshot.local_port)
        .ok_or_else(|| HaError::NoMatchingTransport {
            entity_id: snapshot.transaction_id.clone(),
            transport: snapshot.transport.clone(),
        })?;

    parse_request(&snapshot.transaction_id, &snapshot.original_request)?;

    let handle = processor
        .open_channel(&snapshot.peer_address, snapshot.peer_port)
        .map_err(|e| HaError::ChannelCreation {
            entity_id: snapshot.transaction_id.clone(),
            message: e.to_string(),
        })?;
    let channel = arena.insert_channel(handle);

    let mut transaction = Transaction::new(
        snapshot.transaction_id.clone(),
        snapshot.kind,
        snapshot.original_request.clone(),
        snapshot.transport.clone(),
        snapshot.peer_address.clone(),
        snapshot.peer_port,
        snapshot.local_port,
    );
    let outcome = reconcile::apply_transaction_snapshot(&mut transaction, snapshot, true);
    debug_assert_eq!(outcome, ApplyOutcome::Recreated);
    transaction.bind_channel(channel);
    transaction.replicated = true;

    info!(
        transaction_id = %snapshot.transaction_id,
        version = snapshot.version,
        transport = %snapshot.transport,
        "rebuilt transaction from stored snapshot"
    );
    Ok(transaction)
}

fn parse_request(entity_id: &str, text: &str) -> HaResult<()> {
    match rsip::SipMessage::try_from(text) {
        Ok(rsip::SipMessage::Request(_)) => Ok(()),
        Ok(rsip::SipMessage::Response(_)) => Err(HaError::malformed(
            entity_id,
            "stored original request is a response",
        )),
        Err(e) => Err(HaError::malformed(
            entity_id,
            format!("stored request does not parse: {e}"),
        )),
    }
}

fn parse_response(entity_id: &str, text: &str) -> HaResult<()> {
    match rsip::SipMessage::try_from(text) {
        Ok(rsip::SipMessage::Response(_)) => Ok(()),
        Ok(rsip::SipMessage::Request(_)) => Err(HaError::malformed(
            entity_id,
            "stored last response is a request",
        )),
        Err(e) => Err(HaError::malformed(
            entity_id,
            format!("stored response does not parse: {e}"),
        )),
    }
}
