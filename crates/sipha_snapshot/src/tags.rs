//! Fixed tag vocabulary for dialog and transaction snapshots.
//!
//! Every replicable field has a short, stable string tag. Tags are the
//! keys of the [`crate::SnapshotMap`] wire/storage form and never change
//! once released; renaming a tag is a protocol break between cluster
//! nodes running different versions.

use crate::dirty::SnapshotField;

/// Replicable fields of a dialog.
///
/// The discriminant doubles as the field's bit position in
/// [`crate::DirtyFields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DialogField {
    /// Per-entity version counter.
    Version,
    /// Last final/early response, canonical text.
    LastResponse,
    /// Local tag parameter.
    LocalTag,
    /// Remote tag parameter.
    RemoteTag,
    /// Local CSeq number.
    LocalCseq,
    /// Remote CSeq number.
    RemoteCseq,
    /// Dialog state.
    State,
    /// Owning method (immutable after creation).
    Method,
    /// Whether this node held the UAS role when the snapshot was built.
    IsServer,
    /// Local party address text.
    LocalParty,
    /// Remote party address text.
    RemoteParty,
    /// Ordered route set header values.
    RouteSet,
    /// Remote target URI.
    RemoteTarget,
    /// Contact header text.
    ContactHeader,
    /// Event header text.
    EventHeader,
    /// Back-to-back user agent flag.
    B2bua,
    /// Terminate-dialog-on-BYE flag.
    TerminateOnBye,
    /// CSeq validation toggle.
    CseqValidation,
    /// Re-INVITE in progress flag.
    Reinvite,
    /// Descriptor of the dialog-creating transaction.
    FirstTransaction,
    /// Opaque application payload.
    ApplicationData,
}

impl DialogField {
    /// Returns the field's short wire tag.
    pub const fn tag(self) -> &'static str {
        match self {
            DialogField::Version => "v",
            DialogField::LastResponse => "lr",
            DialogField::LocalTag => "lt",
            DialogField::RemoteTag => "rt",
            DialogField::LocalCseq => "lcs",
            DialogField::RemoteCseq => "rcs",
            DialogField::State => "ds",
            DialogField::Method => "mth",
            DialogField::IsServer => "srv",
            DialogField::LocalParty => "lp",
            DialogField::RemoteParty => "rp",
            DialogField::RouteSet => "rl",
            DialogField::RemoteTarget => "rtu",
            DialogField::ContactHeader => "ch",
            DialogField::EventHeader => "eh",
            DialogField::B2bua => "b2b",
            DialogField::TerminateOnBye => "tob",
            DialogField::CseqValidation => "csv",
            DialogField::Reinvite => "riv",
            DialogField::FirstTransaction => "ftx",
            DialogField::ApplicationData => "app",
        }
    }
}

impl SnapshotField for DialogField {
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Sub-tags of the first-transaction descriptor.
///
/// These live alongside the dialog tags in the same flat map; the
/// descriptor is tracked by the single [`DialogField::FirstTransaction`]
/// dirty bit because its parts only ever change together.
pub(crate) mod first_transaction {
    /// Transaction id (branch).
    pub const ID: &str = "fti";
    /// Transaction method.
    pub const METHOD: &str = "ftm";
    /// Local port the transaction arrived on.
    pub const PORT: &str = "ftp";
    /// Secure transport flag.
    pub const SECURE: &str = "ftsec";
    /// Server-transaction flag.
    pub const IS_SERVER: &str = "ftsrv";
}

/// Replicable fields of a client or server transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TransactionField {
    /// Per-entity version counter.
    Version,
    /// Original request, canonical text.
    OriginalRequest,
    /// Associated dialog id, when one exists.
    DialogId,
    /// Current transaction state.
    State,
    /// Transport name (udp, tcp, tls, ...).
    Transport,
    /// Peer IP address text.
    PeerAddress,
    /// Peer port.
    PeerPort,
    /// Local port.
    LocalPort,
}

impl TransactionField {
    /// Returns the field's short wire tag.
    pub const fn tag(self) -> &'static str {
        match self {
            TransactionField::Version => "v",
            TransactionField::OriginalRequest => "req",
            TransactionField::DialogId => "did",
            TransactionField::State => "ts",
            TransactionField::Transport => "tp",
            TransactionField::PeerAddress => "pa",
            TransactionField::PeerPort => "pp",
            TransactionField::LocalPort => "lport",
        }
    }
}

impl SnapshotField for TransactionField {
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Tag holding the entity id itself, shared by both entity kinds.
pub(crate) const ID_TAG: &str = "id";

/// Tag holding the transaction kind (client/server).
pub(crate) const KIND_TAG: &str = "kind";
