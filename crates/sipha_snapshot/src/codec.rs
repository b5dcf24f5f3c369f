//! CBOR byte encoding for snapshot maps.
//!
//! Backends that persist snapshots off-heap (or ship them across the
//! cluster interconnect) need a byte form. The tag map serializes to
//! CBOR; because [`crate::SnapshotMap`] iterates in tag order, equal maps
//! produce identical bytes.

use crate::error::{SnapshotError, SnapshotResult};
use crate::value::SnapshotMap;

/// Encodes a snapshot map to CBOR bytes.
///
/// # Errors
///
/// Returns [`SnapshotError::Codec`] if serialization fails.
pub fn map_to_cbor(map: &SnapshotMap) -> SnapshotResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(map, &mut bytes)
        .map_err(|e| SnapshotError::Codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a snapshot map from CBOR bytes.
///
/// # Errors
///
/// Returns [`SnapshotError::Codec`] if the bytes are not a valid
/// CBOR-encoded tag map.
pub fn map_from_cbor(bytes: &[u8]) -> SnapshotResult<SnapshotMap> {
    ciborium::de::from_reader(bytes).map_err(|e| SnapshotError::Codec(e.to_string()))
}
