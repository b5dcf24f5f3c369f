//! Replication and recovery engine for SIP dialogs and transactions.
//!
//! One node of a SIP cluster runs a [`ReplicationManager`] wired to a
//! [`sipha_cache::SipEntityCache`] backend. As the stack processes
//! calls, it reports the interesting transitions to the manager, which
//! mirrors replication-worthy entities into the cache as versioned
//! snapshots. After a node failure, the surviving node recovers the
//! failed node's calls from those snapshots and keeps serving them.
//!
//! # Event flow
//!
//! ```text
//!   SIP stack ──responses/transitions──▶ ReplicationManager
//!                                          │ policy: is a write due?
//!                                          ▼
//!                                    SipEntityCache
//!                                          ▲
//!   failover driver ◀──recover_*──────────┘
//! ```
//!
//! Replication must never hurt call processing: every write failure is
//! logged and swallowed. The recovery reads are the only operations
//! that surface cache trouble to the caller.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod arena;
pub mod config;
pub mod dialog;
pub mod error;
pub mod manager;
pub mod policy;
pub mod reconcile;
pub mod reconstruct;
pub mod transaction;
pub mod transport;

pub use arena::EntityArena;
pub use config::{ReplicationConfig, ReplicationStrategy};
pub use dialog::Dialog;
pub use error::{HaError, HaResult};
pub use manager::ReplicationManager;
pub use reconcile::ApplyOutcome;
pub use transaction::Transaction;
pub use transport::{
    ChannelHandle, ChannelId, ChannelOpenError, MessageProcessor, ProcessorRegistry,
    StaticProcessor,
};
