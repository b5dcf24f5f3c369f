//! Dialog snapshot type and its tag-map round-trip.

use crate::error::{SnapshotError, SnapshotResult};
use crate::tags::{first_transaction, DialogField, ID_TAG};
use crate::value::SnapshotMap;

/// Replication-relevant dialog states.
///
/// The surrounding stack may track finer-grained states (waiting for ACK,
/// re-INVITE in progress, ...); only these three matter to the
/// replication policy and the stored form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// Provisional response exchanged, dialog not yet confirmed.
    Early,
    /// Final 2xx exchanged, dialog established.
    Confirmed,
    /// Dialog ended; its snapshot is about to be removed.
    Terminated,
}

impl DialogState {
    /// Converts to a numeric code for the stored form.
    pub fn to_code(self) -> u64 {
        match self {
            DialogState::Early => 1,
            DialogState::Confirmed => 2,
            DialogState::Terminated => 3,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(DialogState::Early),
            2 => Some(DialogState::Confirmed),
            3 => Some(DialogState::Terminated),
            _ => None,
        }
    }
}

/// Descriptor of the transaction that created the dialog.
///
/// Written once, on the first snapshot build; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstTransactionInfo {
    /// Transaction id (branch parameter).
    pub id: String,
    /// Request method of the transaction.
    pub method: String,
    /// Local port the transaction was bound to.
    pub port: u16,
    /// Whether the transport was secure.
    pub secure: bool,
    /// Whether it was a server transaction.
    pub is_server: bool,
}

/// The serialized, versioned, flat representation of a dialog.
///
/// Hot fields (`version`, sequence numbers, tags, last response) are
/// populated on every build. Cold fields are `None` unless they were
/// dirty at build time; a `None` read back from the cache means "not
/// included", never "clear".
#[derive(Debug, Clone, PartialEq)]
pub struct DialogSnapshot {
    /// Stable dialog id (Call-ID + tags).
    pub dialog_id: String,
    /// Version counter at build time.
    pub version: u64,
    /// Canonical text of the last early/final response.
    pub last_response: Option<String>,
    /// Local tag, when assigned.
    pub local_tag: Option<String>,
    /// Remote tag, when assigned.
    pub remote_tag: Option<String>,
    /// Local CSeq number.
    pub local_cseq: u64,
    /// Remote CSeq number.
    pub remote_cseq: u64,
    /// Dialog state, when it changed since the previous build.
    pub state: Option<DialogState>,
    /// Owning method (first build only).
    pub method: Option<String>,
    /// UAS-role marker of the writing node (first build only).
    pub is_server: Option<bool>,
    /// Local party address text.
    pub local_party: Option<String>,
    /// Remote party address text.
    pub remote_party: Option<String>,
    /// Ordered route set.
    pub route_set: Option<Vec<String>>,
    /// Remote target URI.
    pub remote_target: Option<String>,
    /// Contact header text.
    pub contact_header: Option<String>,
    /// Event header text.
    pub event_header: Option<String>,
    /// B2BUA flag.
    pub is_b2bua: Option<bool>,
    /// Terminate-on-BYE flag.
    pub terminate_on_bye: Option<bool>,
    /// CSeq validation toggle.
    pub cseq_validation: Option<bool>,
    /// Re-INVITE in progress flag.
    pub is_reinvite: Option<bool>,
    /// Descriptor of the dialog-creating transaction (first build only).
    pub first_transaction: Option<FirstTransactionInfo>,
    /// Opaque application payload.
    pub application_data: Option<String>,
}

impl DialogSnapshot {
    /// Creates a snapshot holding only the always-included fields.
    pub fn new(dialog_id: impl Into<String>, version: u64, local_cseq: u64, remote_cseq: u64) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            version,
            last_response: None,
            local_tag: None,
            remote_tag: None,
            local_cseq,
            remote_cseq,
            state: None,
            method: None,
            is_server: None,
            local_party: None,
            remote_party: None,
            route_set: None,
            remote_target: None,
            contact_header: None,
            event_header: None,
            is_b2bua: None,
            terminate_on_bye: None,
            cseq_validation: None,
            is_reinvite: None,
            first_transaction: None,
            application_data: None,
        }
    }

    /// Flattens the snapshot into its tag-map form.
    ///
    /// `None` fields produce no entry.
    pub fn to_map(&self) -> SnapshotMap {
        let mut map = SnapshotMap::new();
        map.put_text(ID_TAG, self.dialog_id.clone());
        map.put_long(DialogField::Version.tag(), self.version);
        map.put_long(DialogField::LocalCseq.tag(), self.local_cseq);
        map.put_long(DialogField::RemoteCseq.tag(), self.remote_cseq);

        if let Some(v) = &self.last_response {
            map.put_text(DialogField::LastResponse.tag(), v.clone());
        }
        if let Some(v) = &self.local_tag {
            map.put_text(DialogField::LocalTag.tag(), v.clone());
        }
        if let Some(v) = &self.remote_tag {
            map.put_text(DialogField::RemoteTag.tag(), v.clone());
        }
        if let Some(v) = self.state {
            map.put_long(DialogField::State.tag(), v.to_code());
        }
        if let Some(v) = &self.method {
            map.put_text(DialogField::Method.tag(), v.clone());
        }
        if let Some(v) = self.is_server {
            map.put_flag(DialogField::IsServer.tag(), v);
        }
        if let Some(v) = &self.local_party {
            map.put_text(DialogField::LocalParty.tag(), v.clone());
        }
        if let Some(v) = &self.remote_party {
            map.put_text(DialogField::RemoteParty.tag(), v.clone());
        }
        if let Some(v) = &self.route_set {
            map.put_text_list(DialogField::RouteSet.tag(), v.clone());
        }
        if let Some(v) = &self.remote_target {
            map.put_text(DialogField::RemoteTarget.tag(), v.clone());
        }
        if let Some(v) = &self.contact_header {
            map.put_text(DialogField::ContactHeader.tag(), v.clone());
        }
        if let Some(v) = &self.event_header {
            map.put_text(DialogField::EventHeader.tag(), v.clone());
        }
        if let Some(v) = self.is_b2bua {
            map.put_flag(DialogField::B2bua.tag(), v);
        }
        if let Some(v) = self.terminate_on_bye {
            map.put_flag(DialogField::TerminateOnBye.tag(), v);
        }
        if let Some(v) = self.cseq_validation {
            map.put_flag(DialogField::CseqValidation.tag(), v);
        }
        if let Some(v) = self.is_reinvite {
            map.put_flag(DialogField::Reinvite.tag(), v);
        }
        if let Some(ft) = &self.first_transaction {
            map.put_text(first_transaction::ID, ft.id.clone());
            map.put_text(first_transaction::METHOD, ft.method.clone());
            map.put_long(first_transaction::PORT, u64::from(ft.port));
            map.put_flag(first_transaction::SECURE, ft.secure);
            map.put_flag(first_transaction::IS_SERVER, ft.is_server);
        }
        if let Some(v) = &self.application_data {
            map.put_text(DialogField::ApplicationData.tag(), v.clone());
        }

        map
    }

    /// Rebuilds a snapshot from its tag-map form.
    ///
    /// # Errors
    ///
    /// Fails if the id, version, or sequence numbers are absent, or if a
    /// present field holds a value of the wrong shape.
    pub fn from_map(map: &SnapshotMap) -> SnapshotResult<Self> {
        let dialog_id = map.require_text(ID_TAG)?;
        let version = map.require_long(DialogField::Version.tag())?;
        let local_cseq = map.require_long(DialogField::LocalCseq.tag())?;
        let remote_cseq = map.require_long(DialogField::RemoteCseq.tag())?;

        let state = match map.long(DialogField::State.tag())? {
            None => None,
            Some(code) => Some(DialogState::from_code(code).ok_or_else(|| {
                SnapshotError::invalid(
                    DialogField::State.tag(),
                    format!("unknown dialog state code {code}"),
                )
            })?),
        };

        let first_transaction = match map.text(first_transaction::ID)? {
            None => None,
            Some(id) => {
                let port = map.require_long(first_transaction::PORT)?;
                let port = u16::try_from(port).map_err(|_| {
                    SnapshotError::invalid(
                        first_transaction::PORT,
                        format!("port {port} out of range"),
                    )
                })?;
                Some(FirstTransactionInfo {
                    id,
                    method: map.require_text(first_transaction::METHOD)?,
                    port,
                    secure: map.flag(first_transaction::SECURE)?.unwrap_or(false),
                    is_server: map.flag(first_transaction::IS_SERVER)?.unwrap_or(false),
                })
            }
        };

        Ok(Self {
            dialog_id,
            version,
            last_response: map.text(DialogField::LastResponse.tag())?,
            local_tag: map.text(DialogField::LocalTag.tag())?,
            remote_tag: map.text(DialogField::RemoteTag.tag())?,
            local_cseq,
            remote_cseq,
            state,
            method: map.text(DialogField::Method.tag())?,
            is_server: map.flag(DialogField::IsServer.tag())?,
            local_party: map.text(DialogField::LocalParty.tag())?,
            remote_party: map.text(DialogField::RemoteParty.tag())?,
            route_set: map.text_list(DialogField::RouteSet.tag())?,
            remote_target: map.text(DialogField::RemoteTarget.tag())?,
            contact_header: map.text(DialogField::ContactHeader.tag())?,
            event_header: map.text(DialogField::EventHeader.tag())?,
            is_b2bua: map.flag(DialogField::B2bua.tag())?,
            terminate_on_bye: map.flag(DialogField::TerminateOnBye.tag())?,
            cseq_validation: map.flag(DialogField::CseqValidation.tag())?,
            is_reinvite: map.flag(DialogField::Reinvite.tag())?,
            first_transaction,
            application_data: map.text(DialogField::ApplicationData.tag())?,
        })
    }
}
