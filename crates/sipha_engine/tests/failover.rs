//! End-to-end replication and failover scenarios against the in-memory
//! backend: one manager plays the active node, a second manager sharing
//! the same cache plays the node taking over.

use sipha_cache::{CacheOp, EntityKind, InMemoryCache, SipEntityCache};
use sipha_engine::{
    Dialog, EntityArena, HaError, ProcessorRegistry, ReplicationConfig, ReplicationManager,
    ReplicationStrategy, StaticProcessor, Transaction,
};
use sipha_snapshot::{DialogState, TransactionKind, TransactionState};
use std::sync::Arc;

const INVITE: &str = "INVITE sip:bob@example.com SIP/2.0\r\n\
    Via: SIP/2.0/UDP client.example.com;branch=z9hG4bK-1\r\n\
    Max-Forwards: 70\r\n\
    From: Alice <sip:alice@example.com>;tag=t1\r\n\
    To: Bob <sip:bob@example.com>\r\n\
    Call-ID: call-1@client.example.com\r\n\
    CSeq: 1 INVITE\r\n\
    Contact: <sip:alice@client.example.com>\r\n\
    Content-Length: 0\r\n\r\n";

const RINGING_180: &str = "SIP/2.0 180 Ringing\r\n\
    Via: SIP/2.0/UDP client.example.com;branch=z9hG4bK-1\r\n\
    From: Alice <sip:alice@example.com>;tag=t1\r\n\
    To: Bob <sip:bob@example.com>;tag=t2\r\n\
    Call-ID: call-1@client.example.com\r\n\
    CSeq: 1 INVITE\r\n\
    Content-Length: 0\r\n\r\n";

const OK_200: &str = "SIP/2.0 200 OK\r\n\
    Via: SIP/2.0/UDP client.example.com;branch=z9hG4bK-1\r\n\
    From: Alice <sip:alice@example.com>;tag=t1\r\n\
    To: Bob <sip:bob@example.com>;tag=t2\r\n\
    Call-ID: call-1@client.example.com\r\n\
    CSeq: 1 INVITE\r\n\
    Contact: <sip:bob@server.example.com>\r\n\
    Content-Length: 0\r\n\r\n";

// 200 to a re-INVITE; same dialog, different response text.
const OK_200_REINVITE: &str = "SIP/2.0 200 OK\r\n\
    Via: SIP/2.0/UDP client.example.com;branch=z9hG4bK-2\r\n\
    From: Alice <sip:alice@example.com>;tag=t1\r\n\
    To: Bob <sip:bob@example.com>;tag=t2\r\n\
    Call-ID: call-1@client.example.com\r\n\
    CSeq: 2 INVITE\r\n\
    Contact: <sip:bob@server.example.com>\r\n\
    Content-Length: 0\r\n\r\n";

fn manager_with(
    strategy: ReplicationStrategy,
    cache: Arc<InMemoryCache>,
) -> ReplicationManager {
    static TRACING: std::sync::Once = std::sync::Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });

    let processors = ProcessorRegistry::new();
    processors.register(Arc::new(StaticProcessor::new("udp", 5080, false)));
    ReplicationManager::new(
        ReplicationConfig::new(strategy),
        cache,
        Arc::new(EntityArena::new()),
        processors,
    )
}

fn confirmed_dialog(id: &str) -> Dialog {
    let mut dialog = Dialog::new(id, "INVITE", true);
    dialog.set_local_tag("t2");
    dialog.set_remote_tag("t1");
    dialog.set_local_cseq(0);
    dialog.set_remote_cseq(1);
    dialog.set_parties("<sip:bob@example.com>", "<sip:alice@example.com>");
    dialog.set_remote_target("sip:alice@client.example.com");
    dialog.set_state(DialogState::Confirmed);
    dialog
}

fn server_invite_tx(id: &str) -> Transaction {
    Transaction::new(
        id,
        TransactionKind::Server,
        INVITE,
        "udp",
        "192.0.2.15",
        5060,
        5080,
    )
}

#[test]
fn confirmed_dialog_lifecycle_put_update_remove() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    m.track_dialog(confirmed_dialog("d1"));

    // First due write is a put, the next one an update.
    assert!(m.on_dialog_response("d1", 200, OK_200).unwrap());
    m.arena().with_dialog_mut("d1", |d| d.set_local_cseq(2));
    assert!(m.on_dialog_response("d1", 200, OK_200_REINVITE).unwrap());
    m.on_dialog_terminated("d1");

    assert_eq!(
        cache.ops(),
        vec![
            CacheOp::PutDialog("d1".into()),
            CacheOp::UpdateDialog("d1".into()),
            CacheOp::RemoveDialog("d1".into()),
        ]
    );
    assert!(!m.arena().contains_dialog("d1"));
}

#[test]
fn version_advances_once_per_replicated_write() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    m.track_dialog(confirmed_dialog("d1"));

    m.on_dialog_response("d1", 200, OK_200).unwrap();
    assert_eq!(cache.get_dialog("d1").unwrap().unwrap().version, 1);

    m.arena().with_dialog_mut("d1", |d| d.set_local_cseq(2));
    m.on_dialog_response("d1", 200, OK_200_REINVITE).unwrap();
    assert_eq!(cache.get_dialog("d1").unwrap().unwrap().version, 2);
}

#[test]
fn retransmission_is_suppressed() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    m.track_dialog(confirmed_dialog("d1"));

    assert!(m.on_dialog_response("d1", 200, OK_200).unwrap());
    // Same response text again: retransmission, no second write.
    assert!(!m.on_dialog_response("d1", 200, OK_200).unwrap());
    assert!(!m.on_dialog_response("d1", 200, OK_200).unwrap());

    assert_eq!(cache.ops(), vec![CacheOp::PutDialog("d1".into())]);
    assert_eq!(cache.get_dialog("d1").unwrap().unwrap().version, 1);
}

#[test]
fn early_dialogs_replicate_only_under_early_strategy() {
    let cache = Arc::new(InMemoryCache::new());
    let confirmed = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    let mut dialog = confirmed_dialog("d1");
    dialog.set_state(DialogState::Early);
    confirmed.track_dialog(dialog);

    assert!(!confirmed.on_dialog_response("d1", 180, RINGING_180).unwrap());
    assert!(cache.ops().is_empty());

    let early = manager_with(ReplicationStrategy::EarlyDialog, Arc::clone(&cache));
    let mut dialog = confirmed_dialog("d2");
    dialog.set_state(DialogState::Early);
    early.track_dialog(dialog);

    assert!(early.on_dialog_response("d2", 180, RINGING_180).unwrap());
    assert_eq!(cache.ops(), vec![CacheOp::PutDialog("d2".into())]);
}

#[test]
fn confirmation_write_carries_state_and_response_text() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    let mut dialog = confirmed_dialog("d1");
    dialog.set_state(DialogState::Early);
    m.track_dialog(dialog);

    // Provisional responses on an early dialog never write.
    assert!(!m.on_dialog_response("d1", 180, RINGING_180).unwrap());
    assert!(!m.on_dialog_response("d1", 180, RINGING_180).unwrap());

    // Confirmation: exactly one write, carrying the new state and the
    // final response text.
    m.arena()
        .with_dialog_mut("d1", |d| d.set_state(DialogState::Confirmed));
    assert!(m.on_dialog_response("d1", 200, OK_200).unwrap());

    assert_eq!(cache.ops(), vec![CacheOp::PutDialog("d1".into())]);
    let stored = cache.get_dialog("d1").unwrap().unwrap();
    assert_eq!(stored.state, Some(DialogState::Confirmed));
    assert_eq!(stored.last_response.as_deref(), Some(OK_200));
}

#[test]
fn server_transaction_replicates_first_provisional_only() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::EarlyDialog, Arc::clone(&cache));
    m.track_server_transaction(server_invite_tx("z9hG4bK-1"));

    assert!(!m.on_server_transaction_response("z9hG4bK-1", 100).unwrap());
    assert!(m.on_server_transaction_response("z9hG4bK-1", 180).unwrap());
    // Second provisional and the final: no further transaction writes.
    assert!(!m.on_server_transaction_response("z9hG4bK-1", 183).unwrap());
    assert!(!m.on_server_transaction_response("z9hG4bK-1", 200).unwrap());

    assert_eq!(
        cache.ops(),
        vec![CacheOp::PutServerTransaction("z9hG4bK-1".into())]
    );
}

#[test]
fn transactions_never_replicate_under_confirmed_strategy() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    m.track_server_transaction(server_invite_tx("z9hG4bK-1"));

    assert!(!m.on_server_transaction_response("z9hG4bK-1", 180).unwrap());
    assert!(cache.ops().is_empty());
}

#[test]
fn client_transaction_writes_on_improving_status_only() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::EarlyDialog, Arc::clone(&cache));
    m.track_client_transaction(Transaction::new(
        "z9hG4bK-c1",
        TransactionKind::Client,
        INVITE,
        "udp",
        "192.0.2.20",
        5060,
        5080,
    ));

    assert!(m
        .on_client_transaction_state("z9hG4bK-c1", TransactionState::Trying, 100)
        .unwrap());
    assert!(m
        .on_client_transaction_state("z9hG4bK-c1", TransactionState::Proceeding, 180)
        .unwrap());
    // Retransmitted 180: watermark not exceeded.
    assert!(!m
        .on_client_transaction_state("z9hG4bK-c1", TransactionState::Proceeding, 180)
        .unwrap());
    // Final response: transaction replication stops here.
    assert!(!m
        .on_client_transaction_state("z9hG4bK-c1", TransactionState::Completed, 200)
        .unwrap());

    assert_eq!(
        cache.ops(),
        vec![
            CacheOp::PutClientTransaction("z9hG4bK-c1".into()),
            CacheOp::UpdateClientTransaction("z9hG4bK-c1".into()),
        ]
    );
}

#[test]
fn failover_round_trip_recovers_the_dialog_with_roles_swapped() {
    let cache = Arc::new(InMemoryCache::new());

    // Active node replicates a confirmed UAS dialog.
    let active = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    let mut dialog = confirmed_dialog("d1");
    dialog.set_local_cseq(4);
    dialog.set_remote_cseq(7);
    active.track_dialog(dialog);
    assert!(active.on_dialog_response("d1", 200, OK_200).unwrap());

    // Takeover node has nothing live and recovers from the cache.
    let takeover = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    assert!(takeover.recover_dialog("d1").unwrap());

    takeover
        .arena()
        .with_dialog("d1", |d| {
            assert_eq!(d.state(), DialogState::Confirmed);
            assert_eq!(d.last_response(), Some(OK_200));
            // UAS snapshot: the recovering side sees the swapped view.
            assert_eq!(d.local_cseq(), 7);
            assert_eq!(d.remote_cseq(), 4);
            assert_eq!(d.local_party(), Some("<sip:alice@example.com>"));
            assert_eq!(d.remote_party(), Some("<sip:bob@example.com>"));
        })
        .expect("dialog recovered");
}

#[test]
fn recovered_dialog_resumes_replication_with_updates() {
    let cache = Arc::new(InMemoryCache::new());
    let active = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    active.track_dialog(confirmed_dialog("d1"));
    active.on_dialog_response("d1", 200, OK_200).unwrap();

    let takeover = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    takeover.recover_dialog("d1").unwrap();
    cache.clear_ops();

    // A later response on the recovered dialog updates, never re-puts.
    assert!(takeover.on_dialog_response("d1", 200, OK_200_REINVITE).unwrap());
    assert_eq!(cache.ops(), vec![CacheOp::UpdateDialog("d1".into())]);
    assert_eq!(cache.get_dialog("d1").unwrap().unwrap().version, 2);
}

#[test]
fn transaction_failover_round_trip_opens_a_channel() {
    let cache = Arc::new(InMemoryCache::new());
    let active = manager_with(ReplicationStrategy::EarlyDialog, Arc::clone(&cache));
    let mut tx = server_invite_tx("z9hG4bK-1");
    tx.attach_dialog("d1");
    tx.set_state(TransactionState::Proceeding);
    active.track_server_transaction(tx);
    assert!(active.on_server_transaction_response("z9hG4bK-1", 180).unwrap());

    let takeover = manager_with(ReplicationStrategy::EarlyDialog, Arc::clone(&cache));
    assert!(takeover.recover_server_transaction("z9hG4bK-1").unwrap());

    takeover
        .arena()
        .with_server_transaction("z9hG4bK-1", |tx| {
            assert_eq!(tx.state(), TransactionState::Proceeding);
            assert_eq!(tx.dialog_id(), Some("d1"));
            let channel = tx.channel().expect("channel bound during rebuild");
            let handle = takeover.arena().channel(channel).expect("handle stored");
            assert_eq!(handle.peer_address, "192.0.2.15");
            assert_eq!(handle.peer_port, 5060);
        })
        .expect("transaction recovered");
}

#[test]
fn recovery_without_matching_transport_is_fatal_for_the_attempt() {
    let cache = Arc::new(InMemoryCache::new());
    let active = manager_with(ReplicationStrategy::EarlyDialog, Arc::clone(&cache));
    active.track_server_transaction(server_invite_tx("z9hG4bK-1"));
    active.on_server_transaction_response("z9hG4bK-1", 180).unwrap();

    // Takeover node listens on a different port.
    let processors = ProcessorRegistry::new();
    processors.register(Arc::new(StaticProcessor::new("udp", 5090, false)));
    let takeover = ReplicationManager::new(
        ReplicationConfig::new(ReplicationStrategy::EarlyDialog),
        Arc::clone(&cache) as Arc<dyn SipEntityCache>,
        Arc::new(EntityArena::new()),
        processors,
    );

    let err = takeover.recover_server_transaction("z9hG4bK-1").unwrap_err();
    assert!(matches!(err, HaError::NoMatchingTransport { .. }));
}

#[test]
fn malformed_record_is_not_found_and_isolates_other_entities() {
    let cache = Arc::new(InMemoryCache::new());
    let active = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));

    // A good dialog and a bad one whose stored response is garbage.
    active.track_dialog(confirmed_dialog("good"));
    active.on_dialog_response("good", 200, OK_200).unwrap();
    active.track_dialog(confirmed_dialog("bad"));
    active.on_dialog_response("bad", 200, "not a sip message").unwrap();

    let takeover = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    assert!(!takeover.recover_dialog("bad").unwrap());
    assert!(!takeover.arena().contains_dialog("bad"));

    // The good dialog is untouched by its neighbor's corruption.
    assert!(takeover.recover_dialog("good").unwrap());
}

#[test]
fn reconciliation_lets_the_higher_version_win() {
    let cache = Arc::new(InMemoryCache::new());
    let a = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    let b = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));

    // Both nodes hold the dialog; node B wrote more recently.
    a.track_dialog(confirmed_dialog("d1"));
    a.on_dialog_response("d1", 200, OK_200).unwrap();

    b.track_dialog(confirmed_dialog("d1"));
    b.arena().with_dialog_mut("d1", |d| d.set_local_cseq(9));
    b.on_dialog_response("d1", 200, OK_200).unwrap();
    b.arena().with_dialog_mut("d1", |d| d.set_local_cseq(10));
    b.on_dialog_response("d1", 200, OK_200_REINVITE).unwrap();

    // Node A reconciles against the cache: B's snapshot is newer.
    assert!(a.recover_dialog("d1").unwrap());
    assert_eq!(a.arena().with_dialog("d1", |d| d.version()), Some(2));
    assert_eq!(a.arena().with_dialog("d1", |d| d.local_cseq()), Some(10));

    // Running the same reconciliation again is a stale no-op.
    assert!(!a.recover_dialog("d1").unwrap());
}

#[test]
fn double_write_guard_skips_when_cache_is_ahead() {
    let cache = Arc::new(InMemoryCache::new());
    let a = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    let b = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));

    a.track_dialog(confirmed_dialog("d1"));
    b.track_dialog(confirmed_dialog("d1"));

    // Node B races ahead with two writes; node A's version-1 snapshot
    // must not clobber them.
    b.on_dialog_response("d1", 200, OK_200).unwrap();
    b.on_dialog_response("d1", 200, OK_200_REINVITE).unwrap();
    assert_eq!(cache.get_dialog("d1").unwrap().unwrap().version, 2);

    assert!(!a.on_dialog_response("d1", 200, OK_200).unwrap());
    assert_eq!(cache.get_dialog("d1").unwrap().unwrap().version, 2);
}

#[test]
fn cseq_never_regresses_during_reconciliation() {
    let cache = Arc::new(InMemoryCache::new());
    let a = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    let b = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));

    // The cache snapshot carries a higher version but an older CSeq.
    b.track_dialog(confirmed_dialog("d1"));
    b.arena().with_dialog_mut("d1", |d| d.set_local_cseq(3));
    b.on_dialog_response("d1", 200, OK_200).unwrap();
    b.on_dialog_response("d1", 200, OK_200_REINVITE).unwrap();

    a.track_dialog(confirmed_dialog("d1"));
    a.arena().with_dialog_mut("d1", |d| d.set_local_cseq(50));
    assert!(a.recover_dialog("d1").unwrap());

    assert_eq!(a.arena().with_dialog("d1", |d| d.local_cseq()), Some(50));
    assert_eq!(a.arena().with_dialog("d1", |d| d.version()), Some(2));
}

#[test]
fn application_data_replicates_on_its_own_when_enabled() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    m.track_dialog(confirmed_dialog("d1"));
    m.on_dialog_response("d1", 200, OK_200).unwrap();

    assert!(m.set_application_data("d1", "call-context-42").unwrap());
    let stored = cache.get_dialog("d1").unwrap().unwrap();
    assert_eq!(stored.application_data.as_deref(), Some("call-context-42"));
}

#[test]
fn no_app_data_strategy_keeps_the_payload_local() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(
        ReplicationStrategy::ConfirmedDialogNoAppData,
        Arc::clone(&cache),
    );
    m.track_dialog(confirmed_dialog("d1"));
    m.on_dialog_response("d1", 200, OK_200).unwrap();

    assert!(!m.set_application_data("d1", "secret-context").unwrap());
    let stored = cache.get_dialog("d1").unwrap().unwrap();
    assert_eq!(stored.application_data, None);

    // The live dialog still holds it for local use.
    assert_eq!(
        m.arena()
            .with_dialog("d1", |d| d.application_data().map(String::from)),
        Some(Some("secret-context".to_string()))
    );
}

#[test]
fn eviction_keeps_the_durable_copy_recoverable() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    m.track_dialog(confirmed_dialog("d1"));
    m.on_dialog_response("d1", 200, OK_200).unwrap();

    m.evict_dialog("d1");
    assert!(!m.arena().contains_dialog("d1"));
    assert!(!cache.has_hot_dialog("d1"));
    assert!(cache.has_durable_dialog("d1"));

    // An in-dialog request later brings it back from the durable copy.
    assert!(m.recover_dialog("d1").unwrap());
    assert!(m.arena().contains_dialog("d1"));
}

#[test]
fn remote_removal_purges_locally_without_echoing() {
    let cache = Arc::new(InMemoryCache::new());
    let m = manager_with(ReplicationStrategy::ConfirmedDialog, Arc::clone(&cache));
    m.track_dialog(confirmed_dialog("d1"));
    m.on_dialog_response("d1", 200, OK_200).unwrap();

    let removals = cache.removals().expect("feed").subscribe();
    cache.inject_remote_removal(EntityKind::Dialog, "d1");
    let removed = removals.recv().unwrap();
    cache.clear_ops();

    m.on_remote_entity_removed(&removed);

    assert!(!m.arena().contains_dialog("d1"));
    // No remove (or any other call) went back to the cache.
    assert!(cache.ops().is_empty());
}
