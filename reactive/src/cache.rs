//! Identity-keyed wrapper cache.
//!
//! Every object and array carries an [`ObjectId`] assigned at creation. Wrapping looks
//! the id up here first, so a source object always maps to the same wrapper, and a
//! wrapper is registered *before* its fields are visited, so walking a cyclic graph
//! stops at the first revisit.
//!
//! Entries whose node is no longer referenced from anywhere else are dropped by
//! [`WrapperCache::prune`], which also runs whenever the cache has doubled since the
//! last pass.

use std::collections::HashMap;

use zeal_core::ObjectId;

use crate::handle::Reactive;

const PRUNE_FLOOR: usize = 64;

/// Maps source identities to their wrappers.
#[derive(Debug)]
pub struct WrapperCache {
    wrappers: HashMap<ObjectId, Reactive>,
    prune_at: usize,
}

impl Default for WrapperCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WrapperCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            wrappers: HashMap::new(),
            prune_at: PRUNE_FLOOR,
        }
    }

    /// Returns the wrapper registered for `id`.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<Reactive> {
        self.wrappers.get(&id).cloned()
    }

    /// Registers a wrapper. An existing entry is kept and returned instead.
    pub fn insert(&mut self, id: ObjectId, wrapper: Reactive) -> Reactive {
        if self.wrappers.len() >= self.prune_at {
            self.prune();
            self.prune_at = (self.wrappers.len() * 2).max(PRUNE_FLOOR);
        }
        self.wrappers.entry(id).or_insert(wrapper).clone()
    }

    /// Drops every wrapper whose node is referenced by nothing but the wrapper, and
    /// that no caller holds. Returns how many were dropped.
    ///
    /// Dropping a wrapper releases its node, which may orphan the node's children in
    /// turn, so passes repeat until one drops nothing.
    pub fn prune(&mut self) -> usize {
        let before = self.wrappers.len();
        loop {
            let len = self.wrappers.len();
            self.wrappers.retain(|_, wrapper| !wrapper.is_orphan());
            if self.wrappers.len() == len {
                break;
            }
        }
        let dropped = before - self.wrappers.len();
        if dropped > 0 {
            tracing::trace!(target: "zeal::reactive", dropped, "pruned wrapper cache");
        }
        dropped
    }

    /// Whether `id` has a wrapper.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.wrappers.contains_key(&id)
    }

    /// Number of wrapped objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    /// Whether nothing has been wrapped yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }
}
