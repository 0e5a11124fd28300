//! Building blocks for folding LEFT JOIN products back into aggregates
//!
//! A parent joined against two child tables arrives once per child pair, so
//! each child shows up repeatedly. [`Arena`] keeps one slot per parent key in
//! first-seen order and [`Children`] keeps one entry per child key.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Parents indexed by key, kept in the order they were first seen.
#[derive(Debug)]
pub(crate) struct Arena<K, A> {
    index: HashMap<K, usize>,
    slots: Vec<A>,
}

impl<K: Eq + Hash, A> Arena<K, A> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
        }
    }

    /// The slot for `key`, built with `make` on first sight.
    pub(crate) fn slot(&mut self, key: K, make: impl FnOnce() -> A) -> &mut A {
        let slots = &mut self.slots;
        let at = *self.index.entry(key).or_insert_with(|| {
            slots.push(make());
            slots.len() - 1
        });
        &mut self.slots[at]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn into_slots(self) -> Vec<A> {
        self.slots
    }
}

/// One parent's children, unique by key, in first-seen order.
#[derive(Debug)]
pub(crate) struct Children<K, V> {
    seen: HashSet<K>,
    items: Vec<V>,
}

impl<K: Eq + Hash, V> Children<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    /// Marks `key` as seen. True only the first time.
    pub(crate) fn first_sight(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    /// Push `value` after a successful [`Children::first_sight`].
    pub(crate) fn push(&mut self, value: V) {
        self.items.push(value);
    }

    /// Add `value` unless `key` was already seen.
    pub(crate) fn insert(&mut self, key: K, value: V) -> bool {
        if !self.first_sight(key) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub(crate) fn into_items(self) -> Vec<V> {
        self.items
    }
}
