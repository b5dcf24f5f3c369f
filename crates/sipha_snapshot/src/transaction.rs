//! Transaction snapshot type and its tag-map round-trip.

use crate::error::{SnapshotError, SnapshotResult};
use crate::tags::{TransactionField, ID_TAG, KIND_TAG};
use crate::value::SnapshotMap;

/// Whether a transaction is the client or server side of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// UAC side: this node sent the request.
    Client,
    /// UAS side: this node received the request.
    Server,
}

impl TransactionKind {
    /// Converts to a numeric code for the stored form.
    pub fn to_code(self) -> u64 {
        match self {
            TransactionKind::Client => 1,
            TransactionKind::Server => 2,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(TransactionKind::Client),
            2 => Some(TransactionKind::Server),
            _ => None,
        }
    }
}

/// RFC 3261 transaction states, shared by both kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransactionState {
    /// Request sent/received, no response yet.
    Trying,
    /// Provisional response sent/received.
    Proceeding,
    /// Final response sent/received, absorbing retransmissions.
    Completed,
    /// ACK received (INVITE server transactions only).
    Confirmed,
    /// Transaction done; about to be reaped.
    Terminated,
}

impl TransactionState {
    /// Converts to a numeric code for the stored form.
    pub fn to_code(self) -> u64 {
        match self {
            TransactionState::Trying => 1,
            TransactionState::Proceeding => 2,
            TransactionState::Completed => 3,
            TransactionState::Confirmed => 4,
            TransactionState::Terminated => 5,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(TransactionState::Trying),
            2 => Some(TransactionState::Proceeding),
            3 => Some(TransactionState::Completed),
            4 => Some(TransactionState::Confirmed),
            5 => Some(TransactionState::Terminated),
            _ => None,
        }
    }
}

/// The serialized, versioned, flat representation of a transaction.
///
/// Unlike dialogs, a transaction snapshot always carries every field: the
/// record is small and written at most a handful of times over the
/// transaction's life.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionSnapshot {
    /// Transaction id (typically the branch parameter).
    pub transaction_id: String,
    /// Client or server side.
    pub kind: TransactionKind,
    /// Version counter at build time.
    pub version: u64,
    /// Canonical text of the original request.
    pub original_request: String,
    /// Associated dialog id; may be unknown before a dialog exists.
    pub dialog_id: Option<String>,
    /// Current transaction state.
    pub state: TransactionState,
    /// Transport name (udp, tcp, tls, ...).
    pub transport: String,
    /// Peer IP address text.
    pub peer_address: String,
    /// Peer port.
    pub peer_port: u16,
    /// Local port.
    pub local_port: u16,
}

impl TransactionSnapshot {
    /// Flattens the snapshot into its tag-map form.
    pub fn to_map(&self) -> SnapshotMap {
        let mut map = SnapshotMap::new();
        map.put_text(ID_TAG, self.transaction_id.clone());
        map.put_long(KIND_TAG, self.kind.to_code());
        map.put_long(TransactionField::Version.tag(), self.version);
        map.put_text(
            TransactionField::OriginalRequest.tag(),
            self.original_request.clone(),
        );
        if let Some(dialog_id) = &self.dialog_id {
            map.put_text(TransactionField::DialogId.tag(), dialog_id.clone());
        }
        map.put_long(TransactionField::State.tag(), self.state.to_code());
        map.put_text(TransactionField::Transport.tag(), self.transport.clone());
        map.put_text(
            TransactionField::PeerAddress.tag(),
            self.peer_address.clone(),
        );
        map.put_long(TransactionField::PeerPort.tag(), u64::from(self.peer_port));
        map.put_long(
            TransactionField::LocalPort.tag(),
            u64::from(self.local_port),
        );
        map
    }

    /// Rebuilds a snapshot from its tag-map form.
    ///
    /// # Errors
    ///
    /// Fails if any non-optional field is absent, malformed, or out of
    /// range.
    pub fn from_map(map: &SnapshotMap) -> SnapshotResult<Self> {
        let kind_code = map.require_long(KIND_TAG)?;
        let kind = TransactionKind::from_code(kind_code).ok_or_else(|| {
            SnapshotError::invalid(KIND_TAG, format!("unknown transaction kind {kind_code}"))
        })?;

        let state_code = map.require_long(TransactionField::State.tag())?;
        let state = TransactionState::from_code(state_code).ok_or_else(|| {
            SnapshotError::invalid(
                TransactionField::State.tag(),
                format!("unknown transaction state code {state_code}"),
            )
        })?;

        let peer_port = read_port(map, TransactionField::PeerPort.tag())?;
        let local_port = read_port(map, TransactionField::LocalPort.tag())?;

        Ok(Self {
            transaction_id: map.require_text(ID_TAG)?,
            kind,
            version: map.require_long(TransactionField::Version.tag())?,
            original_request: map.require_text(TransactionField::OriginalRequest.tag())?,
            dialog_id: map.text(TransactionField::DialogId.tag())?,
            state,
            transport: map.require_text(TransactionField::Transport.tag())?,
            peer_address: map.require_text(TransactionField::PeerAddress.tag())?,
            peer_port,
            local_port,
        })
    }
}

fn read_port(map: &SnapshotMap, tag: &'static str) -> SnapshotResult<u16> {
    let raw = map.require_long(tag)?;
    u16::try_from(raw).map_err(|_| SnapshotError::invalid(tag, format!("port {raw} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SnapshotValue;

    fn sample() -> TransactionSnapshot {
        TransactionSnapshot {
            transaction_id: "z9hG4bK-524287-1".into(),
            kind: TransactionKind::Server,
            version: 1,
            original_request: "INVITE sip:bob@example.com SIP/2.0\r\n\r\n".into(),
            dialog_id: Some("abc@host|tag1|tag2".into()),
            state: TransactionState::Proceeding,
            transport: "udp".into(),
            peer_address: "192.0.2.15".into(),
            peer_port: 5060,
            local_port: 5080,
        }
    }

    #[test]
    fn kind_and_state_codes_roundtrip() {
        for kind in [TransactionKind::Client, TransactionKind::Server] {
            assert_eq!(TransactionKind::from_code(kind.to_code()), Some(kind));
        }
        for state in [
            TransactionState::Trying,
            TransactionState::Proceeding,
            TransactionState::Completed,
            TransactionState::Confirmed,
            TransactionState::Terminated,
        ] {
            assert_eq!(TransactionState::from_code(state.to_code()), Some(state));
        }
        assert_eq!(TransactionKind::from_code(0), None);
        assert_eq!(TransactionState::from_code(9), None);
    }

    #[test]
    fn state_ordering_tracks_progress() {
        assert!(TransactionState::Trying < TransactionState::Proceeding);
        assert!(TransactionState::Proceeding < TransactionState::Completed);
        assert!(TransactionState::Confirmed < TransactionState::Terminated);
    }

    #[test]
    fn map_roundtrip() {
        let snapshot = sample();
        let decoded = TransactionSnapshot::from_map(&snapshot.to_map()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn dialog_id_may_be_absent() {
        let mut snapshot = sample();
        snapshot.dialog_id = None;

        let map = snapshot.to_map();
        assert!(!map.contains(TransactionField::DialogId.tag()));

        let decoded = TransactionSnapshot::from_map(&map).unwrap();
        assert_eq!(decoded.dialog_id, None);
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let mut map = sample().to_map();
        map.put_long(TransactionField::PeerPort.tag(), 70000);

        assert!(matches!(
            TransactionSnapshot::from_map(&map),
            Err(SnapshotError::InvalidValue { .. })
        ));
    }

    #[test]
    fn missing_request_is_rejected() {
        let snapshot = sample();
        let mut map = SnapshotMap::new();
        // Copy everything except the original request.
        for (tag, value) in snapshot.to_map().iter() {
            if tag != TransactionField::OriginalRequest.tag() {
                match value.clone() {
                    SnapshotValue::Long(v) => map.put_long(tag, v),
                    SnapshotValue::Flag(v) => map.put_flag(tag, v),
                    SnapshotValue::Text(v) => map.put_text(tag, v),
                    SnapshotValue::TextList(v) => map.put_text_list(tag, v),
                }
            }
        }

        assert!(matches!(
            TransactionSnapshot::from_map(&map),
            Err(SnapshotError::MissingField { tag: "req" })
        ));
    }
}
