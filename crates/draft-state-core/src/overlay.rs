#![forbid(unsafe_code)]

//! Pending-write map shadowing an original.
//!
//! An [`Overlay`] holds at most one staged value per key, in first-write
//! order. Re-staging a key replaces its value in place, so the merge order is
//! stable but never changes the outcome.

use indexmap::IndexMap;
use indexmap::map::Drain;

/// Staged property writes for one draft.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay<V> {
    entries: IndexMap<String, V>,
}

impl<V> Default for Overlay<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Overlay<V> {
    /// Create an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Staged value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Whether `key` has been staged.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Stage `value` under `key`, returning the value it replaces.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.entries.insert(key.into(), value)
    }

    /// Staged keys in first-write order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Remove and yield every staged entry, leaving the overlay empty.
    pub fn drain(&mut self) -> Drain<'_, String, V> {
        self.entries.drain(..)
    }

    /// Number of staged keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
