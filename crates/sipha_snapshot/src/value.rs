//! Tag→value map underlying every snapshot.

use crate::error::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value stored under a snapshot tag.
///
/// The vocabulary is deliberately small: counters and ports travel as
/// [`SnapshotValue::Long`], protocol flags as [`SnapshotValue::Flag`],
/// canonical SIP message/header text as [`SnapshotValue::Text`], and the
/// route set as [`SnapshotValue::TextList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotValue {
    /// An unsigned counter, port, or status code.
    Long(u64),
    /// A boolean protocol flag.
    Flag(bool),
    /// Canonical textual serialization of a SIP message, header, or URI.
    Text(String),
    /// An ordered list of header values (route set).
    TextList(Vec<String>),
}

impl SnapshotValue {
    /// Returns the value as a u64 if it is a `Long`.
    pub fn as_long(&self) -> Option<u64> {
        match self {
            SnapshotValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a bool if it is a `Flag`.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            SnapshotValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SnapshotValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a string list if it is a `TextList`.
    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            SnapshotValue::TextList(v) => Some(v),
            _ => None,
        }
    }
}

/// The flat, ordered tag→value mapping a snapshot serializes to.
///
/// Keys are the short tags from the fixed vocabulary in
/// [`crate::DialogField`] / [`crate::TransactionField`]. Iteration order
/// is the tag's byte order, so two maps holding the same entries encode
/// to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotMap {
    entries: BTreeMap<String, SnapshotValue>,
}

impl SnapshotMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a counter/port value.
    pub fn put_long(&mut self, tag: &str, value: u64) {
        self.entries.insert(tag.into(), SnapshotValue::Long(value));
    }

    /// Inserts a boolean flag.
    pub fn put_flag(&mut self, tag: &str, value: bool) {
        self.entries.insert(tag.into(), SnapshotValue::Flag(value));
    }

    /// Inserts a text value.
    pub fn put_text(&mut self, tag: &str, value: impl Into<String>) {
        self.entries
            .insert(tag.into(), SnapshotValue::Text(value.into()));
    }

    /// Inserts an ordered text list.
    pub fn put_text_list(&mut self, tag: &str, value: Vec<String>) {
        self.entries
            .insert(tag.into(), SnapshotValue::TextList(value));
    }

    /// Returns the raw value stored under `tag`, if any.
    pub fn get(&self, tag: &str) -> Option<&SnapshotValue> {
        self.entries.get(tag)
    }

    /// Returns true if `tag` is present.
    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// Reads an optional `Long` value, failing only on a type mismatch.
    pub fn long(&self, tag: &str) -> SnapshotResult<Option<u64>> {
        match self.entries.get(tag) {
            None => Ok(None),
            Some(v) => v
                .as_long()
                .map(Some)
                .ok_or_else(|| SnapshotError::wrong_type(tag, "long")),
        }
    }

    /// Reads a required `Long` value.
    pub fn require_long(&self, tag: &'static str) -> SnapshotResult<u64> {
        self.long(tag)?.ok_or(SnapshotError::missing(tag))
    }

    /// Reads an optional `Flag` value, failing only on a type mismatch.
    pub fn flag(&self, tag: &str) -> SnapshotResult<Option<bool>> {
        match self.entries.get(tag) {
            None => Ok(None),
            Some(v) => v
                .as_flag()
                .map(Some)
                .ok_or_else(|| SnapshotError::wrong_type(tag, "flag")),
        }
    }

    /// Reads an optional `Text` value, failing only on a type mismatch.
    pub fn text(&self, tag: &str) -> SnapshotResult<Option<String>> {
        match self.entries.get(tag) {
            None => Ok(None),
            Some(v) => v
                .as_text()
                .map(|s| Some(s.to_owned()))
                .ok_or_else(|| SnapshotError::wrong_type(tag, "text")),
        }
    }

    /// Reads a required `Text` value.
    pub fn require_text(&self, tag: &'static str) -> SnapshotResult<String> {
        self.text(tag)?.ok_or(SnapshotError::missing(tag))
    }

    /// Reads an optional `TextList` value, failing only on a type
    /// mismatch.
    pub fn text_list(&self, tag: &str) -> SnapshotResult<Option<Vec<String>>> {
        match self.entries.get(tag) {
            None => Ok(None),
            Some(v) => v
                .as_text_list()
                .map(|s| Some(s.to_vec()))
                .ok_or_else(|| SnapshotError::wrong_type(tag, "text list")),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
