//! Dirty-field bookkeeping for snapshot builds.

use std::marker::PhantomData;

/// A field that can be dirty-tracked.
///
/// Implementors map each field to a distinct bit; the whole vocabulary of
/// an entity must fit in 32 bits.
pub trait SnapshotField: Copy {
    /// Returns the field's bit mask.
    fn bit(self) -> u32;
}

/// Per-entity dirty-field set.
///
/// One instance lives on every live dialog and transaction. Mutators mark
/// the field they touched; the snapshot build queries and clears the bits
/// in one pass so a field marked after the build starts lands in the
/// *next* snapshot, not a half of each.
///
/// The `first_snapshot` marker forces one-time fields (owning method,
/// role, first-transaction descriptor) into the very first build; they
/// are immutable afterwards and are never tracked as dirty again.
#[derive(Debug, Clone)]
pub struct DirtyFields<F: SnapshotField> {
    bits: u32,
    first_snapshot: bool,
    _field: PhantomData<F>,
}

impl<F: SnapshotField> DirtyFields<F> {
    /// Creates a tracker for a freshly created entity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bits: 0,
            first_snapshot: true,
            _field: PhantomData,
        }
    }

    /// Marks a field as changed since the last snapshot build.
    pub fn mark(&mut self, field: F) {
        self.bits |= field.bit();
    }

    /// Returns true if the field is currently dirty.
    pub fn is_dirty(&self, field: F) -> bool {
        self.bits & field.bit() != 0
    }

    /// Returns true if any field is dirty.
    pub fn any_dirty(&self) -> bool {
        self.bits != 0
    }

    /// Consumes the field's dirty bit, returning whether it was set.
    pub fn take(&mut self, field: F) -> bool {
        let set = self.is_dirty(field);
        self.bits &= !field.bit();
        set
    }

    /// Returns true if no snapshot has been built yet.
    pub fn is_first_snapshot(&self) -> bool {
        self.first_snapshot
    }

    /// Consumes the first-snapshot marker, returning whether it was set.
    pub fn take_first_snapshot(&mut self) -> bool {
        std::mem::take(&mut self.first_snapshot)
    }

    /// Clears every dirty bit without building a snapshot.
    ///
    /// Used when a remote copy overwrites local state wholesale: the
    /// overwritten fields are not "changes" this node needs to publish.
    pub fn clear(&mut self) {
        self.bits = 0;
    }
}

impl<F: SnapshotField> Default for DirtyFields<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u32)]
    enum TestField {
        A,
        B,
        C,
    }

    impl SnapshotField for TestField {
        fn bit(self) -> u32 {
            1 << (self as u32)
        }
    }

    #[test]
    fn mark_and_take() {
        let mut dirty = DirtyFields::<TestField>::new();
        assert!(!dirty.any_dirty());

        dirty.mark(TestField::A);
        dirty.mark(TestField::C);

        assert!(dirty.is_dirty(TestField::A));
        assert!(!dirty.is_dirty(TestField::B));

        assert!(dirty.take(TestField::A));
        assert!(!dirty.take(TestField::A));
        assert!(dirty.is_dirty(TestField::C));
    }

    #[test]
    fn first_snapshot_marker_fires_once() {
        let mut dirty = DirtyFields::<TestField>::new();
        assert!(dirty.is_first_snapshot());
        assert!(dirty.take_first_snapshot());
        assert!(!dirty.take_first_snapshot());
        assert!(!dirty.is_first_snapshot());
    }

    #[test]
    fn clear_drops_all_bits() {
        let mut dirty = DirtyFields::<TestField>::new();
        dirty.mark(TestField::A);
        dirty.mark(TestField::B);
        dirty.clear();
        assert!(!dirty.any_dirty());
        // Clearing dirty bits does not touch the first-snapshot marker.
        assert!(dirty.is_first_snapshot());
    }
}
