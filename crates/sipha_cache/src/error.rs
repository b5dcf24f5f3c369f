//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur at the cache adapter boundary.
///
/// Absence of an entity is **not** an error: reads return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store is unreachable or refused the operation.
    ///
    /// On replication write paths callers log and continue; on explicit
    /// recovery reads callers propagate, because failover logic needs to
    /// know the read failed.
    #[error("cache unavailable: {message}")]
    Unavailable {
        /// Backend-supplied description of the failure.
        message: String,
    },

    /// A stored snapshot could not be decoded back into its typed form.
    #[error("stored snapshot corrupted for '{entity_id}': {reason}")]
    Corrupted {
        /// Id of the entity whose record is unreadable.
        entity_id: String,
        /// What failed while decoding.
        reason: String,
    },

    /// No backend is registered under the requested name.
    #[error("unknown cache backend '{name}'")]
    UnknownBackend {
        /// The name looked up in the registry.
        name: String,
    },
}

impl CacheError {
    /// Creates an unavailability error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a corrupted-record error.
    pub fn corrupted(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }
}
