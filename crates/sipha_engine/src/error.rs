//! Error types for the replication engine.

use sipha_cache::CacheError;
use thiserror::Error;

/// Result type for engine operations.
pub type HaResult<T> = Result<T, HaError>;

/// Errors that can occur during replication and recovery.
#[derive(Debug, Error)]
pub enum HaError {
    /// The cache adapter failed.
    ///
    /// Write paths log and swallow this; the explicit recovery-read path
    /// propagates it so failover logic knows the read failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A stored field could not be parsed back into a protocol object.
    ///
    /// Scoped to the single entity being reconstructed; that entity is
    /// unrecoverable, every other entity is unaffected.
    #[error("malformed snapshot for '{entity_id}': {reason}")]
    MalformedSnapshot {
        /// Id of the unrecoverable entity.
        entity_id: String,
        /// What failed to parse.
        reason: String,
    },

    /// No local message processor serves the snapshot's transport.
    ///
    /// A node misconfiguration: the recovering node cannot actually
    /// serve this call. Fatal for the reconstruction attempt, not
    /// retried.
    #[error("no local transport matches '{transport}' for entity '{entity_id}'")]
    NoMatchingTransport {
        /// Id of the entity being reconstructed.
        entity_id: String,
        /// The transport recorded in the snapshot.
        transport: String,
    },

    /// Opening a transport channel during reconstruction failed.
    #[error("channel creation failed for entity '{entity_id}': {message}")]
    ChannelCreation {
        /// Id of the entity being reconstructed.
        entity_id: String,
        /// Transport-supplied description of the failure.
        message: String,
    },

    /// The dialog is not present in the live table.
    #[error("no live dialog '{dialog_id}'")]
    DialogNotFound {
        /// The id that was looked up.
        dialog_id: String,
    },

    /// The transaction is not present in the live table.
    #[error("no live transaction '{transaction_id}'")]
    TransactionNotFound {
        /// The id that was looked up.
        transaction_id: String,
    },
}

impl HaError {
    /// Creates a malformed-snapshot error.
    pub fn malformed(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_error_converts() {
        let err: HaError = CacheError::unavailable("down").into();
        assert!(matches!(err, HaError::Cache(_)));
    }

    #[test]
    fn error_display() {
        let err = HaError::NoMatchingTransport {
            entity_id: "tx-1".into(),
            transport: "sctp".into(),
        };
        assert!(err.to_string().contains("sctp"));
        assert!(err.to_string().contains("tx-1"));
    }
}
