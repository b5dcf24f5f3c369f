//! # SIPHA Cache
//!
//! Cache adapter contract and backends for SIP HA replication.
//!
//! This crate provides the abstraction the replication engine persists
//! through. Backends are **snapshot stores**: they hold flat, versioned
//! dialog/transaction snapshots keyed by entity id and know nothing about
//! SIP semantics, replication policy, or conflict resolution.
//!
//! ## Design Principles
//!
//! - Backends expose put/get/update/remove/evict per entity kind
//! - Eviction drops only the hot in-memory copy; the durable copy stays
//! - Backends may push remote-removal notifications through a
//!   [`RemovalFeed`]; they never interpret them
//! - Backends are selected through an explicit [`CacheRegistry`], not by
//!   runtime class loading
//!
//! ## Available Backends
//!
//! - [`InMemoryCache`] - single-process store for tests and local mode

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod error;
mod memory;
mod registry;
mod removal;

pub use adapter::{EntityKind, SipEntityCache};
pub use error::{CacheError, CacheResult};
pub use memory::{CacheOp, InMemoryCache};
pub use registry::{CacheFactory, CacheRegistry};
pub use removal::{RemovalFeed, RemovedEntity};
