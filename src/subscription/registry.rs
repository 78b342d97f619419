//! Topic → callback registry.
//!
//! The registry is the source of truth for which topics should be
//! subscribed on the wire. The connection layer replays it after every
//! reconnect; it never forgets an entry on its own.
//!
//! # Invariants
//!
//! - A topic is present iff it has at least one callback.
//! - [`Registry::insert`] reports when a topic gains its first callback and
//!   [`Registry::remove`] reports when it loses its last one. Those are the
//!   only two points where wire traffic is needed.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;

use crate::identifiers::Topic;

use super::Callback;

// ============================================================================
// Removal
// ============================================================================

/// Outcome of [`Registry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The callback was not registered for the topic. Nothing changed.
    NotRegistered,
    /// The callback was removed; other callbacks remain.
    Remaining(usize),
    /// The last callback was removed and the topic entry deleted.
    Emptied,
}

// ============================================================================
// Entry
// ============================================================================

/// Callbacks for one topic.
#[derive(Debug)]
struct Entry {
    /// Insertion sequence, used for replay order.
    seq: u64,
    /// Callbacks in registration order. Duplicates allowed.
    callbacks: Vec<Callback>,
}

// ============================================================================
// Registry
// ============================================================================

/// In-memory map from topic to the callbacks interested in it.
#[derive(Debug, Default)]
pub struct Registry {
    entries: FxHashMap<Topic, Entry>,
    next_seq: u64,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `callback` to `topic`.
    ///
    /// Returns `true` if this created the topic entry (first subscriber).
    pub fn insert(&mut self, topic: Topic, callback: Callback) -> bool {
        if let Some(entry) = self.entries.get_mut(&topic) {
            entry.callbacks.push(callback);
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            topic,
            Entry {
                seq,
                callbacks: vec![callback],
            },
        );
        true
    }

    /// Removes one registration of `callback` from `topic`.
    ///
    /// Only the same handle (or a clone of it) matches.
    pub fn remove(&mut self, topic: &str, callback: &Callback) -> Removal {
        let Some(entry) = self.entries.get_mut(topic) else {
            return Removal::NotRegistered;
        };

        let Some(index) = entry.callbacks.iter().position(|cb| cb.same_as(callback)) else {
            return Removal::NotRegistered;
        };

        entry.callbacks.remove(index);

        if entry.callbacks.is_empty() {
            self.entries.remove(topic);
            Removal::Emptied
        } else {
            Removal::Remaining(entry.callbacks.len())
        }
    }

    /// Returns a snapshot of the callbacks for `topic`, in registration order.
    ///
    /// The snapshot lets callers invoke callbacks without holding a borrow
    /// of the registry.
    #[must_use]
    pub fn callbacks(&self, topic: &str) -> Option<Vec<Callback>> {
        self.entries.get(topic).map(|entry| entry.callbacks.clone())
    }

    /// Returns all topics in first-subscription order.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<(&Topic, u64)> = self
            .entries
            .iter()
            .map(|(topic, entry)| (topic, entry.seq))
            .collect();
        topics.sort_unstable_by_key(|(_, seq)| *seq);
        topics.into_iter().map(|(topic, _)| topic.clone()).collect()
    }

    /// Returns `true` if `topic` has at least one callback.
    #[inline]
    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.contains_key(topic)
    }

    /// Returns the number of registrations for `topic`.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.entries
            .get(topic)
            .map_or(0, |entry| entry.callbacks.len())
    }

    /// Returns the number of topics.
    #[inline]
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no topic is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
