//! Live dialog state and snapshot builds.

use crate::transport::ChannelId;
use sipha_snapshot::{
    DialogField, DialogSnapshot, DialogState, DirtyFields, FirstTransactionInfo,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// A live dialog owned by this node's stack.
///
/// The in-memory entity is a cache of the cache: the shared store holds
/// the authoritative snapshot, and this object exists so protocol
/// processing does not round-trip through it. Mutators mark the touched
/// field dirty; [`Dialog::build_snapshot`] turns the accumulated changes
/// into the next versioned snapshot.
///
/// The surrounding stack serializes access to a dialog before invoking
/// replication logic; this type adds no locking of its own.
#[derive(Debug)]
pub struct Dialog {
    pub(crate) id: String,
    pub(crate) is_server: bool,
    pub(crate) version: AtomicU64,
    pub(crate) state: DialogState,
    pub(crate) method: String,
    pub(crate) local_tag: Option<String>,
    pub(crate) remote_tag: Option<String>,
    pub(crate) local_cseq: u64,
    pub(crate) remote_cseq: u64,
    pub(crate) local_party: Option<String>,
    pub(crate) remote_party: Option<String>,
    pub(crate) route_set: Vec<String>,
    pub(crate) remote_target: Option<String>,
    pub(crate) contact_header: Option<String>,
    pub(crate) event_header: Option<String>,
    pub(crate) is_b2bua: bool,
    pub(crate) terminate_on_bye: bool,
    pub(crate) cseq_validation: bool,
    pub(crate) is_reinvite: bool,
    pub(crate) first_transaction: Option<FirstTransactionInfo>,
    pub(crate) application_data: Option<String>,
    pub(crate) last_response: Option<String>,
    pub(crate) dirty: DirtyFields<DialogField>,
    /// Text of the response the cache last saw; used to suppress
    /// retransmission-triggered rewrites.
    pub(crate) last_replicated_response: Option<String>,
    /// Whether this dialog has ever been written to the cache.
    pub(crate) replicated: bool,
    /// Transport channel in the arena's channel table, when bound.
    pub(crate) channel: Option<ChannelId>,
}

impl Dialog {
    /// Creates a dialog instantiated by this node.
    pub fn new(id: impl Into<String>, method: impl Into<String>, is_server: bool) -> Self {
        Self {
            id: id.into(),
            is_server,
            version: AtomicU64::new(0),
            state: DialogState::Early,
            method: method.into(),
            local_tag: None,
            remote_tag: None,
            local_cseq: 0,
            remote_cseq: 0,
            local_party: None,
            remote_party: None,
            route_set: Vec::new(),
            remote_target: None,
            contact_header: None,
            event_header: None,
            is_b2bua: false,
            terminate_on_bye: true,
            cseq_validation: true,
            is_reinvite: false,
            first_transaction: None,
            application_data: None,
            last_response: None,
            dirty: DirtyFields::new(),
            last_replicated_response: None,
            replicated: false,
            channel: None,
        }
    }

    /// Returns the dialog id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the current version counter.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Returns true if this node holds the UAS role for the dialog.
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Returns the current dialog state.
    pub fn state(&self) -> DialogState {
        self.state
    }

    /// Returns the owning method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the local CSeq number.
    pub fn local_cseq(&self) -> u64 {
        self.local_cseq
    }

    /// Returns the remote CSeq number.
    pub fn remote_cseq(&self) -> u64 {
        self.remote_cseq
    }

    /// Returns the local tag, when assigned.
    pub fn local_tag(&self) -> Option<&str> {
        self.local_tag.as_deref()
    }

    /// Returns the remote tag, when assigned.
    pub fn remote_tag(&self) -> Option<&str> {
        self.remote_tag.as_deref()
    }

    /// Returns the local party address text.
    pub fn local_party(&self) -> Option<&str> {
        self.local_party.as_deref()
    }

    /// Returns the remote party address text.
    pub fn remote_party(&self) -> Option<&str> {
        self.remote_party.as_deref()
    }

    /// Returns the route set.
    pub fn route_set(&self) -> &[String] {
        &self.route_set
    }

    /// Returns the canonical text of the last recorded response.
    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Returns the application payload, when set.
    pub fn application_data(&self) -> Option<&str> {
        self.application_data.as_deref()
    }

    /// Returns the bound transport channel id, when any.
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Sets the dialog state.
    ///
    /// Marks the field dirty but never triggers a write by itself; the
    /// write happens when the response that caused the transition is
    /// recorded.
    pub fn set_state(&mut self, state: DialogState) {
        if self.state != state {
            self.state = state;
            self.dirty.mark(DialogField::State);
        }
    }

    /// Records the last early/final response text.
    pub fn set_last_response(&mut self, text: impl Into<String>) {
        self.last_response = Some(text.into());
    }

    /// Sets the local tag.
    pub fn set_local_tag(&mut self, tag: impl Into<String>) {
        self.local_tag = Some(tag.into());
    }

    /// Sets the remote tag.
    pub fn set_remote_tag(&mut self, tag: impl Into<String>) {
        self.remote_tag = Some(tag.into());
    }

    /// Sets the local CSeq number.
    pub fn set_local_cseq(&mut self, cseq: u64) {
        self.local_cseq = cseq;
    }

    /// Sets the remote CSeq number.
    pub fn set_remote_cseq(&mut self, cseq: u64) {
        self.remote_cseq = cseq;
    }

    /// Sets the local and remote party address text.
    pub fn set_parties(
        &mut self,
        local_party: impl Into<String>,
        remote_party: impl Into<String>,
    ) {
        self.local_party = Some(local_party.into());
        self.remote_party = Some(remote_party.into());
        self.dirty.mark(DialogField::LocalParty);
        self.dirty.mark(DialogField::RemoteParty);
    }

    /// Replaces the route set.
    pub fn set_route_set(&mut self, routes: Vec<String>) {
        self.route_set = routes;
        self.dirty.mark(DialogField::RouteSet);
    }

    /// Sets the remote target URI.
    pub fn set_remote_target(&mut self, target: impl Into<String>) {
        self.remote_target = Some(target.into());
        self.dirty.mark(DialogField::RemoteTarget);
    }

    /// Sets the contact header text.
    pub fn set_contact_header(&mut self, contact: impl Into<String>) {
        self.contact_header = Some(contact.into());
        self.dirty.mark(DialogField::ContactHeader);
    }

    /// Sets the event header text.
    pub fn set_event_header(&mut self, event: impl Into<String>) {
        self.event_header = Some(event.into());
        self.dirty.mark(DialogField::EventHeader);
    }

    /// Sets the B2BUA flag.
    pub fn set_b2bua(&mut self, b2bua: bool) {
        self.is_b2bua = b2bua;
        self.dirty.mark(DialogField::B2bua);
    }

    /// Sets the terminate-on-BYE flag.
    pub fn set_terminate_on_bye(&mut self, terminate: bool) {
        self.terminate_on_bye = terminate;
        self.dirty.mark(DialogField::TerminateOnBye);
    }

    /// Sets the CSeq-validation toggle.
    pub fn set_cseq_validation(&mut self, enabled: bool) {
        self.cseq_validation = enabled;
        self.dirty.mark(DialogField::CseqValidation);
    }

    /// Sets the re-INVITE in progress flag.
    pub fn set_reinvite(&mut self, reinvite: bool) {
        self.is_reinvite = reinvite;
        self.dirty.mark(DialogField::Reinvite);
    }

    /// Records the dialog-creating transaction descriptor.
    pub fn set_first_transaction(&mut self, info: FirstTransactionInfo) {
        self.first_transaction = Some(info);
        self.dirty.mark(DialogField::FirstTransaction);
    }

    /// Sets the opaque application payload.
    pub fn set_application_data(&mut self, data: impl Into<String>) {
        self.application_data = Some(data.into());
        self.dirty.mark(DialogField::ApplicationData);
    }

    /// Binds the dialog to a transport channel.
    pub fn bind_channel(&mut self, channel: ChannelId) {
        self.channel = Some(channel);
    }

    /// Builds the next snapshot, consuming the dirty set.
    ///
    /// Increments the version counter exactly once per call. Hot fields
    /// (last response, tags, sequence numbers) are always included; cold
    /// fields only when dirty. The first build additionally includes
    /// every populated field, one-time fields among them: they are
    /// immutable after creation and never tracked as dirty afterwards.
    pub fn build_snapshot(&mut self) -> DialogSnapshot {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let first = self.dirty.take_first_snapshot();

        let mut snapshot =
            DialogSnapshot::new(self.id.clone(), version, self.local_cseq, self.remote_cseq);
        snapshot.last_response = self.last_response.clone();
        snapshot.local_tag = self.local_tag.clone();
        snapshot.remote_tag = self.remote_tag.clone();

        if first {
            snapshot.method = Some(self.method.clone());
            snapshot.is_server = Some(self.is_server);
        }
        if self.dirty.take(DialogField::State) || first {
            snapshot.state = Some(self.state);
        }
        if self.dirty.take(DialogField::LocalParty) || first {
            snapshot.local_party = self.local_party.clone();
        }
        if self.dirty.take(DialogField::RemoteParty) || first {
            snapshot.remote_party = self.remote_party.clone();
        }
        if self.dirty.take(DialogField::RouteSet) || (first && !self.route_set.is_empty()) {
            snapshot.route_set = Some(self.route_set.clone());
        }
        if self.dirty.take(DialogField::RemoteTarget) || first {
            snapshot.remote_target = self.remote_target.clone();
        }
        if self.dirty.take(DialogField::ContactHeader) || first {
            snapshot.contact_header = self.contact_header.clone();
        }
        if self.dirty.take(DialogField::EventHeader) || first {
            snapshot.event_header = self.event_header.clone();
        }
        if self.dirty.take(DialogField::B2bua) || first {
            snapshot.is_b2bua = Some(self.is_b2bua);
        }
        if self.dirty.take(DialogField::TerminateOnBye) || first {
            snapshot.terminate_on_bye = Some(self.terminate_on_bye);
        }
        if self.dirty.take(DialogField::CseqValidation) || first {
            snapshot.cseq_validation = Some(self.cseq_validation);
        }
        if self.dirty.take(DialogField::Reinvite) || first {
            snapshot.is_reinvite = Some(self.is_reinvite);
        }
        if self.dirty.take(DialogField::FirstTransaction) || first {
            snapshot.first_transaction = self.first_transaction.clone();
        }
        if self.dirty.take(DialogField::ApplicationData) || first {
            snapshot.application_data = self.application_data.clone();
        }

        snapshot
    }
}
