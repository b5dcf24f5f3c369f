//! # SIPHA Snapshot
//!
//! Versioned snapshot model for SIP dialog/transaction replication.
//!
//! This crate provides:
//! - Flat tag→value snapshot maps with a fixed tag vocabulary
//! - Dialog and transaction snapshot types with map round-trips
//! - Dirty-field tracking (explicit bitset, first-snapshot marker)
//! - CBOR byte encoding for backends that persist off-heap
//!
//! ## Design Principles
//!
//! - A snapshot is a **flat** mapping: dialogs and transactions reference
//!   each other by id, never by pointer
//! - Hot fields (version, last response, tags, sequence numbers) are
//!   always emitted; cold fields only when their dirty bit is set
//! - An absent map entry means "not included in this build", never
//!   "clear the existing value"
//! - Values are primitive scalars, canonical SIP message/header text, or
//!   ordered lists of such text, so any RFC 3261 parser can reconstruct
//!   them

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod dialog;
mod dirty;
mod error;
mod tags;
mod transaction;
mod value;

pub use codec::{map_from_cbor, map_to_cbor};
pub use dialog::{DialogSnapshot, DialogState, FirstTransactionInfo};
pub use dirty::{DirtyFields, SnapshotField};
pub use error::{SnapshotError, SnapshotResult};
pub use tags::{DialogField, TransactionField};
pub use transaction::{TransactionKind, TransactionSnapshot, TransactionState};
pub use value::{SnapshotMap, SnapshotValue};
